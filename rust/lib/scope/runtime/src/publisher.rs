//! Publish path shared by every generated `<Scope>Publisher`.

use std::sync::Mutex;

use serde::Serialize;

use crate::error::RuntimeError;
use crate::frame::FrameHeader;
use crate::provider::{Client, Provider};

struct PublisherState {
    client: Client,
    seq: i32,
}

/// Transport, protocol and sequence counter of one publisher instance.
///
/// Safe to share between threads: each `publish` runs entirely under one
/// mutex, so concurrent callers get distinct, gap-free sequence numbers and
/// their frames never interleave on the transport.
pub struct PublisherCore {
    state: Mutex<PublisherState>,
}

impl PublisherCore {
    pub fn new(provider: &Provider) -> Result<Self, RuntimeError> {
        Ok(Self::from_client(provider.build()?))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            state: Mutex::new(PublisherState { client, seq: 0 }),
        }
    }

    /// Last sequence number used (0 before the first publish).
    pub fn seq(&self) -> i32 {
        self.state.lock().map(|s| s.seq).unwrap_or_else(|e| e.into_inner().seq)
    }

    /// Send one `Call` frame for `op` carrying `req` on `topic`.
    ///
    /// Errors are returned unchanged; nothing is retried or buffered.
    /// A failure after the counter was incremented consumes that number.
    pub fn publish<T: Serialize>(&self, topic: &str, op: &str, req: &T) -> Result<(), RuntimeError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RuntimeError::Protocol("publisher state poisoned".into()))?;

        state.client.transport().prepare_publish(topic)?;
        state.seq = state.seq.wrapping_add(1);

        let protocol = state.client.protocol();
        let written = protocol
            .write_message_begin(&FrameHeader::call(op, state.seq))
            .and_then(|_| protocol.write_struct(req))
            .and_then(|_| protocol.write_message_end());
        if let Err(e) = written {
            protocol.abort_message();
            return Err(e);
        }

        state.client.transport().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::{TransportError, TransportErrorKind};
    use crate::memory::MemoryBroker;
    use crate::protocol::Protocol;
    use crate::transport::Transport;

    #[derive(Serialize)]
    struct Ping {
        n: u32,
    }

    fn read_seqs(rx: &Protocol, count: usize) -> Vec<i32> {
        (0..count)
            .map(|_| {
                let h = rx.read_message_begin().unwrap();
                rx.read_message_end().unwrap();
                h.seq
            })
            .collect()
    }

    #[test]
    fn sequence_starts_at_one_and_increments() {
        let broker = MemoryBroker::new();
        let rx = broker.transport();
        rx.subscribe("t").unwrap();
        let rx = Protocol::new(rx);

        let core = PublisherCore::new(&crate::Provider::new(broker.clone())).unwrap();
        assert_eq!(core.seq(), 0);
        for n in 0..5 {
            core.publish("t", "Ping", &Ping { n }).unwrap();
        }
        assert_eq!(core.seq(), 5);
        assert_eq!(read_seqs(&rx, 5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn sequence_wraps() {
        let broker = MemoryBroker::new();
        let core = PublisherCore::from_client(Client::new(broker.transport()));
        core.state.lock().unwrap().seq = i32::MAX;
        core.publish("t", "Ping", &Ping { n: 0 }).unwrap();
        assert_eq!(core.seq(), i32::MIN);
    }

    #[test]
    fn concurrent_publishers_get_distinct_numbers() {
        let broker = MemoryBroker::new();
        let rx = broker.transport();
        rx.subscribe("t").unwrap();
        let rx = Protocol::new(rx);

        let core = Arc::new(PublisherCore::from_client(Client::new(broker.transport())));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let core = Arc::clone(&core);
                std::thread::spawn(move || {
                    for n in 0..25 {
                        core.publish("t", "Ping", &Ping { n }).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut seqs = read_seqs(&rx, 100);
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn rejected_topic_fails_fast_without_consuming_a_number() {
        let broker = MemoryBroker::with_history();
        let core = PublisherCore::from_client(Client::new(broker.transport()));
        let err = core.publish("", "Ping", &Ping { n: 1 }).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Transport(TransportError::new(TransportErrorKind::Rejected, "empty topic"))
        );
        assert_eq!(core.seq(), 0);
        assert!(broker.history().is_empty());
    }

    struct FailingFlush;

    impl Transport for FailingFlush {
        fn prepare_publish(&self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn subscribe(&self, _topic: &str) -> Result<(), TransportError> {
            Ok(())
        }
        fn unsubscribe(&self) -> Result<(), TransportError> {
            Ok(())
        }
        fn write(&self, _message: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
        fn flush(&self) -> Result<(), TransportError> {
            Err(TransportError::new(TransportErrorKind::Unknown, "connection reset"))
        }
        fn read(&self) -> Result<Option<Vec<u8>>, TransportError> {
            Ok(None)
        }
    }

    #[test]
    fn flush_error_propagates_unchanged() {
        let core = PublisherCore::from_client(Client::new(Arc::new(FailingFlush)));
        let err = core.publish("t", "Ping", &Ping { n: 1 }).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Transport(TransportError::new(TransportErrorKind::Unknown, "connection reset"))
        );
        // The next publish is not blocked by the failed one.
        assert!(core.publish("t", "Ping", &Ping { n: 2 }).is_err());
        assert_eq!(core.seq(), 2);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    #[test]
    fn serialization_error_leaves_publisher_usable() {
        let broker = MemoryBroker::with_history();
        let core = PublisherCore::from_client(Client::new(broker.transport()));
        assert!(matches!(
            core.publish("t", "Ping", &Unserializable),
            Err(RuntimeError::Protocol(_))
        ));
        core.publish("t", "Ping", &Ping { n: 1 }).unwrap();
        assert_eq!(broker.history().len(), 1);
    }
}
