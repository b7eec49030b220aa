//! Handle to one running subscription.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::RuntimeError;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Open,
    Closed,
}

pub(crate) struct Shared {
    topic: String,
    transport: Arc<dyn Transport>,
    closed: AtomicBool,
    /// Serializes `transport.unsubscribe` calls.
    detach: Mutex<()>,
    error: OnceLock<RuntimeError>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Record `err` unless an error was already recorded.
    pub(crate) fn signal(&self, err: RuntimeError) -> bool {
        let first = self.error.set(err).is_ok();
        if first {
            if let Some(err) = self.error.get() {
                error!(topic = %self.topic, error = %err, "subscription failed");
            }
        }
        first
    }

    /// Close the transport. Once closed, later calls return `Ok` without
    /// touching it; a failed close leaves the state `Open` so it can be retried.
    pub(crate) fn unsubscribe(&self) -> Result<(), RuntimeError> {
        self.cancel.cancel();
        let _detach = self.detach.lock().unwrap_or_else(|e| e.into_inner());
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        debug!(topic = %self.topic, "unsubscribing");
        self.transport.unsubscribe()?;
        self.mark_closed();
        Ok(())
    }
}

/// Subscription is the caller's handle to a background receive loop.
///
/// The state only moves `Open → Closed`: on [`unsubscribe`](Self::unsubscribe),
/// when the stream ends, or after an unrecoverable error has been recorded.
/// Dropping the handle does not stop the loop.
pub struct Subscription {
    shared: Arc<Shared>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            shared: Arc::new(Shared {
                topic: topic.into(),
                transport,
                closed: AtomicBool::new(false),
                detach: Mutex::new(()),
                error: OnceLock::new(),
                cancel: CancellationToken::new(),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn topic(&self) -> &str {
        self.shared.topic()
    }

    pub fn state(&self) -> SubscriptionState {
        if self.is_closed() {
            SubscriptionState::Closed
        } else {
            SubscriptionState::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Stop the receive loop and close the transport. Idempotent once it
    /// has succeeded; on error the subscription stays `Open` and the call
    /// may be repeated.
    pub fn unsubscribe(&self) -> Result<(), RuntimeError> {
        self.shared.unsubscribe()
    }

    /// Record a terminal error. Only the first one is kept.
    pub fn signal(&self, err: RuntimeError) -> bool {
        self.shared.signal(err)
    }

    /// The error that ended the loop, if any. A clean end-of-stream or an
    /// explicit unsubscribe leaves this empty.
    pub fn error(&self) -> Option<RuntimeError> {
        self.shared.error.get().cloned()
    }

    /// Wait for the receive loop to finish.
    ///
    /// Returns `false` if there was no loop to wait for or it panicked; a
    /// panic is recorded as a `Worker` error. Must not be called from inside
    /// a handler of the same subscription.
    pub fn join(&self) -> bool {
        let handle = match self.shared.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match handle {
            Some(handle) => match handle.join() {
                Ok(()) => true,
                Err(_) => {
                    self.shared.mark_closed();
                    self.shared
                        .signal(RuntimeError::Worker("receive loop panicked".into()));
                    false
                }
            },
            None => false,
        }
    }

    pub(crate) fn share(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    pub(crate) fn attach_worker(&self, handle: JoinHandle<()>) {
        match self.shared.worker.lock() {
            Ok(mut worker) => *worker = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.shared.topic)
            .field("state", &self.state())
            .field("error", &self.shared.error.get())
            .finish()
    }
}
