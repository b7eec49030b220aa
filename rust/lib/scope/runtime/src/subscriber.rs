//! Subscribe path shared by every generated `<Scope>Subscriber`.

use std::sync::Arc;
use std::thread;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ApplicationError, RuntimeError};
use crate::protocol::Protocol;
use crate::provider::{Client, Provider};
use crate::subscription::{Shared, Subscription};

/// Subscribe to `topic` and deliver every `op` message to `handler` on a
/// dedicated thread.
///
/// Returns once the transport is subscribed and the loop is running. Errors
/// that happen later are reported through [`Subscription::error`].
pub fn subscribe<T, F>(
    provider: &Provider,
    topic: String,
    op: &str,
    handler: F,
) -> Result<Subscription, RuntimeError>
where
    T: DeserializeOwned + Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let client = provider.build()?;
    client.transport().subscribe(&topic)?;

    let subscription = Subscription::new(topic, Arc::clone(client.transport()));
    let shared = subscription.share();
    let op = op.to_string();

    let spawned = thread::Builder::new()
        .name(format!("scopegen-sub:{}", subscription.topic()))
        .spawn(move || receive_loop(shared, client, op, handler));

    match spawned {
        Ok(handle) => {
            subscription.attach_worker(handle);
            debug!(topic = %subscription.topic(), "subscription started");
            Ok(subscription)
        }
        Err(e) => {
            if let Err(u) = subscription.unsubscribe() {
                warn!(topic = %subscription.topic(), error = %u, "unsubscribe after spawn failure");
            }
            Err(RuntimeError::Worker(e.to_string()))
        }
    }
}

/// Read one `op` message from `protocol`.
///
/// A frame for any other operation is skipped and reported as an
/// "unknown method" application error.
pub fn recv<T: DeserializeOwned>(op: &str, protocol: &Protocol) -> Result<T, RuntimeError> {
    let header = protocol.read_message_begin()?;
    if header.name != op {
        protocol.skip_struct()?;
        protocol.read_message_end()?;
        return Err(ApplicationError::unknown_method(op, &header.name).into());
    }
    let req = protocol.read_struct()?;
    protocol.read_message_end()?;
    Ok(req)
}

struct CloseGuard(Arc<Shared>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.mark_closed();
    }
}

fn receive_loop<T, F>(shared: Arc<Shared>, client: Client, op: String, mut handler: F)
where
    T: DeserializeOwned,
    F: FnMut(T),
{
    let guard = CloseGuard(shared);
    let shared = &guard.0;

    loop {
        if shared.is_cancelled() {
            break;
        }
        match recv::<T>(&op, client.protocol()) {
            Ok(req) => {
                if shared.is_cancelled() {
                    break;
                }
                handler(req);
            }
            Err(e) if e.is_end_of_file() => {
                debug!(topic = %shared.topic(), "subscription stream ended");
                break;
            }
            Err(e) => {
                if shared.is_cancelled() {
                    break;
                }
                shared.signal(e);
                if let Err(u) = shared.unsubscribe() {
                    warn!(topic = %shared.topic(), error = %u, "unsubscribe after failure");
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use crate::error::{TransportError, TransportErrorKind};
    use crate::memory::MemoryBroker;
    use crate::publisher::PublisherCore;
    use crate::subscription::SubscriptionState;
    use crate::transport::Transport;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct BarEvent {
        x: i32,
    }

    const WAIT: Duration = Duration::from_secs(5);

    fn raw_publish(broker: &MemoryBroker, topic: &str, bytes: &[u8]) {
        let t = broker.transport();
        t.prepare_publish(topic).unwrap();
        t.write(bytes).unwrap();
        t.flush().unwrap();
    }

    #[test]
    fn delivers_to_handler() {
        let broker = MemoryBroker::new();
        let provider = Provider::new(broker.clone());
        let (tx, rx) = mpsc::channel();
        let sub = subscribe(&provider, "Foo.Bar".into(), "Bar", move |e: BarEvent| {
            tx.send(e).unwrap();
        })
        .unwrap();
        assert_eq!(sub.state(), SubscriptionState::Open);

        let core = PublisherCore::new(&provider).unwrap();
        core.publish("Foo.Bar", "Bar", &BarEvent { x: 1 }).unwrap();
        core.publish("Foo.Bar", "Bar", &BarEvent { x: 2 }).unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), BarEvent { x: 1 });
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), BarEvent { x: 2 });

        sub.unsubscribe().unwrap();
        assert!(sub.join());
        assert!(sub.error().is_none());
        assert_eq!(broker.subscriber_count("Foo.Bar"), 0);
    }

    #[test]
    fn wrong_operation_ends_with_unknown_method() {
        let broker = MemoryBroker::new();
        let provider = Provider::new(broker.clone());
        let sub = subscribe(&provider, "Foo.Bar".into(), "Bar", |_: BarEvent| {
            panic!("handler must not run");
        })
        .unwrap();

        PublisherCore::new(&provider)
            .unwrap()
            .publish("Foo.Bar", "Other", &BarEvent { x: 1 })
            .unwrap();

        assert!(sub.join());
        assert!(sub.is_closed());
        let err = sub.error().unwrap();
        assert!(err.is_unknown_method());
        assert_eq!(
            err.to_string(),
            "application error (UnknownMethod): expected operation 'Bar', received 'Other'"
        );
        assert_eq!(broker.subscriber_count("Foo.Bar"), 0);
    }

    #[test]
    fn undecodable_payload_is_signalled() {
        let broker = MemoryBroker::new();
        let provider = Provider::new(broker.clone());
        let sub = subscribe(&provider, "t".into(), "Bar", |_: BarEvent| {}).unwrap();

        raw_publish(&broker, "t", br#"{"name":"Bar","kind":"call","seq":1,"body":{"x":"nope"}}"#);

        assert!(sub.join());
        assert!(matches!(sub.error(), Some(RuntimeError::Protocol(_))));
        assert_eq!(broker.subscriber_count("t"), 0);
    }

    #[test]
    fn end_of_stream_is_a_clean_exit() {
        let broker = MemoryBroker::new();
        let provider = Provider::new(broker.clone());
        let sub = subscribe(&provider, "t".into(), "Bar", |_: BarEvent| {}).unwrap();

        broker.close_topic("t");

        assert!(sub.join());
        assert!(sub.is_closed());
        assert!(sub.error().is_none());
        sub.unsubscribe().unwrap();
    }

    #[test]
    fn unsubscribe_twice() {
        let broker = MemoryBroker::new();
        let provider = Provider::new(broker.clone());
        let sub = subscribe(&provider, "t".into(), "Bar", |_: BarEvent| {}).unwrap();
        sub.unsubscribe().unwrap();
        sub.unsubscribe().unwrap();
        assert!(sub.join());
        assert_eq!(sub.state(), SubscriptionState::Closed);
        assert!(sub.error().is_none());
    }

    #[test]
    fn rejected_topic_fails_synchronously() {
        let provider = Provider::new(MemoryBroker::new());
        let err = subscribe(&provider, "has space".into(), "Bar", |_: BarEvent| {}).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Transport(TransportError {
                kind: TransportErrorKind::Rejected,
                ..
            })
        ));
    }

    #[test]
    fn factory_error_fails_synchronously() {
        let provider = Provider::new(|| -> Result<Arc<dyn Transport>, TransportError> {
            Err(TransportError::not_open("no broker"))
        });
        assert!(subscribe(&provider, "t".into(), "Bar", |_: BarEvent| {}).is_err());
    }

    /// Delivers one garbage frame, then fails to unsubscribe.
    struct Flaky {
        sent: std::sync::Mutex<bool>,
    }

    impl Transport for Flaky {
        fn prepare_publish(&self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn subscribe(&self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn unsubscribe(&self) -> Result<(), TransportError> {
            Err(TransportError::new(TransportErrorKind::Unknown, "close failed"))
        }
        fn write(&self, _message: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
        fn flush(&self) -> Result<(), TransportError> {
            Ok(())
        }
        fn read(&self) -> Result<Option<Vec<u8>>, TransportError> {
            let mut sent = self.sent.lock().unwrap();
            if *sent {
                return Ok(None);
            }
            *sent = true;
            Ok(Some(b"not json".to_vec()))
        }
    }

    #[test]
    fn unsubscribe_failure_keeps_original_error() {
        let provider = Provider::new(|| -> Result<Arc<dyn Transport>, TransportError> {
            Ok(Arc::new(Flaky {
                sent: std::sync::Mutex::new(false),
            }))
        });
        let sub = subscribe(&provider, "t".into(), "Bar", |_: BarEvent| {}).unwrap();
        assert!(sub.join());
        assert!(matches!(sub.error(), Some(RuntimeError::Protocol(_))));
        assert!(sub.is_closed());
    }

    /// Blocks in `read` until a successful unsubscribe; the first
    /// `failures` unsubscribe calls fail.
    struct Sticky {
        failures: std::sync::Mutex<u32>,
        open: std::sync::Mutex<bool>,
        wake: std::sync::Condvar,
        unsubscribe_calls: std::sync::atomic::AtomicUsize,
    }

    impl Transport for Sticky {
        fn prepare_publish(&self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn subscribe(&self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn unsubscribe(&self) -> Result<(), TransportError> {
            self.unsubscribe_calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::new(TransportErrorKind::Unknown, "broker unreachable"));
            }
            *self.open.lock().unwrap() = false;
            self.wake.notify_all();
            Ok(())
        }
        fn write(&self, _message: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
        fn flush(&self) -> Result<(), TransportError> {
            Ok(())
        }
        fn read(&self) -> Result<Option<Vec<u8>>, TransportError> {
            let mut open = self.open.lock().unwrap();
            while *open {
                open = self.wake.wait(open).unwrap();
            }
            Ok(None)
        }
    }

    #[test]
    fn failed_unsubscribe_stays_open_and_can_be_retried() {
        let sticky = Arc::new(Sticky {
            failures: std::sync::Mutex::new(1),
            open: std::sync::Mutex::new(true),
            wake: std::sync::Condvar::new(),
            unsubscribe_calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let provider = {
            let sticky = Arc::clone(&sticky);
            Provider::new(move || -> Result<Arc<dyn Transport>, TransportError> {
                let transport: Arc<dyn Transport> = sticky.clone();
                Ok(transport)
            })
        };
        let sub = subscribe(&provider, "t".into(), "Bar", |_: BarEvent| {}).unwrap();

        let err = sub.unsubscribe().unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Transport(TransportError {
                kind: TransportErrorKind::Unknown,
                ..
            })
        ));
        // The loop is still blocked in read, so the handle must not claim Closed.
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sub.state(), SubscriptionState::Open);

        sub.unsubscribe().unwrap();
        assert!(sub.join());
        assert_eq!(sub.state(), SubscriptionState::Closed);
        assert!(sub.error().is_none());
        assert_eq!(
            sticky.unsubscribe_calls.load(std::sync::atomic::Ordering::SeqCst),
            2
        );

        // Closed: no further transport calls.
        sub.unsubscribe().unwrap();
        assert_eq!(
            sticky.unsubscribe_calls.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
    }

    #[test]
    fn recv_reads_one_message() {
        let broker = MemoryBroker::new();
        let t = broker.transport();
        t.subscribe("t").unwrap();
        let protocol = Protocol::new(t);
        raw_publish(&broker, "t", br#"{"name":"Bar","kind":"call","seq":3,"body":{"x":7}}"#);
        assert_eq!(recv::<BarEvent>("Bar", &protocol).unwrap(), BarEvent { x: 7 });
    }
}
