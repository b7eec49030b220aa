//! In-memory transport for testing and single-process scenarios.
//!
//! A [`MemoryBroker`] fans every flushed message out to all transports
//! subscribed to the exact topic. Each subscribed [`MemoryTransport`] owns an
//! mpsc receiver; unsubscribing drops the broker's sender so a blocked
//! `read` drains what is queued and then reports end-of-stream.
//!
//! Flushed messages are only kept when the broker is built with
//! [`MemoryBroker::with_history`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::TransportError;
use crate::transport::{Transport, TransportFactory};

struct Route {
    id: u64,
    tx: Sender<Vec<u8>>,
}

/// Shared topic table. Cheap to clone; clones share the same topics.
///
/// ## Example
///
/// ```
/// use scopegen_runtime::{MemoryBroker, Transport};
///
/// let broker = MemoryBroker::new();
/// let sub = broker.transport();
/// sub.subscribe("Baz.Qux").unwrap();
///
/// let publisher = broker.transport();
/// publisher.prepare_publish("Baz.Qux").unwrap();
/// publisher.write(b"hello").unwrap();
/// publisher.flush().unwrap();
///
/// assert_eq!(sub.read().unwrap(), Some(b"hello".to_vec()));
/// ```
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    routes: Mutex<HashMap<String, Vec<Route>>>,
    /// Flushed messages in order: (topic, bytes). `None` unless recording.
    history: Option<Mutex<Vec<(String, Vec<u8>)>>>,
    next_id: AtomicU64,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that also records every flushed message, for assertions in
    /// tests. The record is never trimmed.
    pub fn with_history() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                history: Some(Mutex::new(Vec::new())),
                ..Default::default()
            }),
        }
    }

    /// A new, unattached transport on this broker.
    pub fn transport(&self) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport {
            broker: self.clone(),
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(TransportState::default()),
            inbox: Mutex::new(None),
        })
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.inner.routes).get(topic).map_or(0, Vec::len)
    }

    /// Topics of every recorded message, in publish order. Empty unless
    /// built with [`with_history`](Self::with_history).
    pub fn published_topics(&self) -> Vec<String> {
        self.history().into_iter().map(|(t, _)| t).collect()
    }

    /// Every recorded message, in publish order.
    pub fn history(&self) -> Vec<(String, Vec<u8>)> {
        self.inner
            .history
            .as_ref()
            .map(|h| lock(h).clone())
            .unwrap_or_default()
    }

    /// Detach every subscriber of `topic`. Their reads report end-of-stream.
    pub fn close_topic(&self, topic: &str) -> usize {
        let removed = lock(&self.inner.routes)
            .remove(topic)
            .map_or(0, |r| r.len());
        debug!(topic, removed, "memory broker closed topic");
        removed
    }

    fn attach(&self, topic: &str, id: u64) -> Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel();
        lock(&self.inner.routes)
            .entry(topic.to_string())
            .or_default()
            .push(Route { id, tx });
        rx
    }

    fn detach(&self, topic: &str, id: u64) {
        let mut routes = lock(&self.inner.routes);
        if let Some(list) = routes.get_mut(topic) {
            list.retain(|r| r.id != id);
            if list.is_empty() {
                routes.remove(topic);
            }
        }
    }

    fn deliver(&self, topic: &str, message: Vec<u8>) {
        if let Some(history) = &self.inner.history {
            lock(history).push((topic.to_string(), message.clone()));
        }
        let mut routes = lock(&self.inner.routes);
        if let Some(list) = routes.get_mut(topic) {
            // Receivers dropped without unsubscribing are pruned here.
            list.retain(|r| r.tx.send(message.clone()).is_ok());
        }
    }
}

impl TransportFactory for MemoryBroker {
    fn build(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(self.transport())
    }
}

#[derive(Default)]
struct TransportState {
    publish_topic: Option<String>,
    pending: Vec<Vec<u8>>,
    subscribed: Option<String>,
    used: bool,
}

/// One endpoint on a [`MemoryBroker`].
pub struct MemoryTransport {
    broker: MemoryBroker,
    id: u64,
    state: Mutex<TransportState>,
    inbox: Mutex<Option<Receiver<Vec<u8>>>>,
}

impl MemoryTransport {
    /// Topic this transport is currently subscribed to.
    pub fn subscribed_topic(&self) -> Option<String> {
        lock(&self.state).subscribed.clone()
    }
}

fn check_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() {
        return Err(TransportError::rejected("empty topic"));
    }
    if topic.chars().any(char::is_whitespace) {
        return Err(TransportError::rejected(format!(
            "topic '{}' contains whitespace",
            topic
        )));
    }
    Ok(())
}

impl Transport for MemoryTransport {
    fn prepare_publish(&self, topic: &str) -> Result<(), TransportError> {
        check_topic(topic)?;
        lock(&self.state).publish_topic = Some(topic.to_string());
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        check_topic(topic)?;
        {
            let mut state = lock(&self.state);
            if state.used {
                return Err(TransportError::rejected("transport already used for a subscription"));
            }
            state.used = true;
            state.subscribed = Some(topic.to_string());
        }
        let rx = self.broker.attach(topic, self.id);
        *lock(&self.inbox) = Some(rx);
        debug!(topic, id = self.id, "memory transport subscribed");
        Ok(())
    }

    fn unsubscribe(&self) -> Result<(), TransportError> {
        let topic = lock(&self.state).subscribed.take();
        if let Some(topic) = topic {
            self.broker.detach(&topic, self.id);
            debug!(topic = %topic, id = self.id, "memory transport unsubscribed");
        }
        Ok(())
    }

    fn write(&self, message: &[u8]) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.publish_topic.is_none() {
            return Err(TransportError::not_open("write before prepare_publish"));
        }
        state.pending.push(message.to_vec());
        Ok(())
    }

    fn flush(&self) -> Result<(), TransportError> {
        let (topic, pending) = {
            let mut state = lock(&self.state);
            let topic = state
                .publish_topic
                .clone()
                .ok_or_else(|| TransportError::not_open("flush before prepare_publish"))?;
            (topic, std::mem::take(&mut state.pending))
        };
        for message in pending {
            self.broker.deliver(&topic, message);
        }
        Ok(())
    }

    fn read(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let inbox = lock(&self.inbox);
        match inbox.as_ref() {
            // All senders gone: unsubscribed or topic closed.
            Some(rx) => Ok(rx.recv().ok()),
            None => Err(TransportError::not_open("read before subscribe")),
        }
    }
}

/// Every critical section in this module is a single push/remove/replace,
/// so a poisoned lock still guards consistent data.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    #[test]
    fn fan_out_to_all_subscribers() {
        let broker = MemoryBroker::new();
        let a = broker.transport();
        let b = broker.transport();
        a.subscribe("t").unwrap();
        b.subscribe("t").unwrap();
        assert_eq!(broker.subscriber_count("t"), 2);

        let p = broker.transport();
        p.prepare_publish("t").unwrap();
        p.write(b"1").unwrap();
        p.flush().unwrap();

        assert_eq!(a.read().unwrap(), Some(b"1".to_vec()));
        assert_eq!(b.read().unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn exact_topic_match_only() {
        let broker = MemoryBroker::with_history();
        let sub = broker.transport();
        sub.subscribe("Foo.Bar").unwrap();

        let p = broker.transport();
        p.prepare_publish("Foo.Baz").unwrap();
        p.write(b"x").unwrap();
        p.flush().unwrap();
        sub.unsubscribe().unwrap();

        assert_eq!(sub.read().unwrap(), None);
        assert_eq!(broker.published_topics(), vec!["Foo.Baz"]);
    }

    #[test]
    fn nothing_sent_before_flush() {
        let broker = MemoryBroker::with_history();
        let p = broker.transport();
        p.prepare_publish("t").unwrap();
        p.write(b"x").unwrap();
        assert!(broker.history().is_empty());
        p.flush().unwrap();
        assert_eq!(broker.history().len(), 1);
    }

    #[test]
    fn rejects_bad_topics() {
        let broker = MemoryBroker::new();
        let t = broker.transport();
        assert_eq!(t.prepare_publish("").unwrap_err().kind, TransportErrorKind::Rejected);
        assert_eq!(t.subscribe("a b").unwrap_err().kind, TransportErrorKind::Rejected);
    }

    #[test]
    fn write_and_read_require_setup() {
        let broker = MemoryBroker::new();
        let t = broker.transport();
        assert_eq!(t.write(b"x").unwrap_err().kind, TransportErrorKind::NotOpen);
        assert_eq!(t.flush().unwrap_err().kind, TransportErrorKind::NotOpen);
        assert_eq!(t.read().unwrap_err().kind, TransportErrorKind::NotOpen);
    }

    #[test]
    fn unsubscribe_unblocks_reader() {
        let broker = MemoryBroker::new();
        let t = broker.transport();
        t.subscribe("t").unwrap();

        let reader = {
            let t = Arc::clone(&t);
            std::thread::spawn(move || t.read())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        t.unsubscribe().unwrap();

        assert_eq!(reader.join().unwrap().unwrap(), None);
        assert_eq!(broker.subscriber_count("t"), 0);
        assert_eq!(t.subscribed_topic(), None);
    }

    #[test]
    fn unsubscribe_twice_is_harmless() {
        let broker = MemoryBroker::new();
        let t = broker.transport();
        t.subscribe("t").unwrap();
        t.unsubscribe().unwrap();
        t.unsubscribe().unwrap();
    }

    #[test]
    fn transport_serves_one_subscription() {
        let broker = MemoryBroker::new();
        let t = broker.transport();
        t.subscribe("a").unwrap();
        t.unsubscribe().unwrap();
        assert_eq!(t.subscribe("b").unwrap_err().kind, TransportErrorKind::Rejected);
    }

    #[test]
    fn close_topic_ends_streams() {
        let broker = MemoryBroker::new();
        let t = broker.transport();
        t.subscribe("t").unwrap();
        assert_eq!(broker.close_topic("t"), 1);
        assert_eq!(t.read().unwrap(), None);
    }

    #[test]
    fn history_is_opt_in() {
        let broker = MemoryBroker::new();
        let sub = broker.transport();
        sub.subscribe("t").unwrap();

        let p = broker.transport();
        p.prepare_publish("t").unwrap();
        for _ in 0..3 {
            p.write(b"x").unwrap();
        }
        p.flush().unwrap();

        assert!(broker.history().is_empty());
        assert!(broker.published_topics().is_empty());
        // Delivery does not depend on recording.
        assert_eq!(sub.read().unwrap(), Some(b"x".to_vec()));
    }
}
