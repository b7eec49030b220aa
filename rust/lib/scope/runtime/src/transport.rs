use std::sync::Arc;

use crate::error::TransportError;

/// Transport provides the byte-level pub/sub capability generated code runs on.
///
/// One transport instance serves either a publisher (`prepare_publish`,
/// `write`, `flush`) or a single subscription (`subscribe`, `read`,
/// `unsubscribe`). Methods take `&self`: a subscription closes its transport
/// from another thread while the receive loop is blocked in `read`.
pub trait Transport: Send + Sync {
    /// Direct subsequent writes to `topic`. Returns `Rejected` if the topic is
    /// not acceptable.
    fn prepare_publish(&self, topic: &str) -> Result<(), TransportError>;

    /// Start receiving messages published on `topic`.
    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Stop receiving. A `read` blocked on this transport returns end-of-stream.
    fn unsubscribe(&self) -> Result<(), TransportError>;

    /// Buffer one encoded message for the prepared topic.
    fn write(&self, message: &[u8]) -> Result<(), TransportError>;

    /// Send everything buffered since the last flush.
    fn flush(&self) -> Result<(), TransportError>;

    /// Block until the next message arrives. `Ok(None)` means end-of-stream.
    fn read(&self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Creates a fresh transport per publisher or subscription.
pub trait TransportFactory: Send + Sync {
    fn build(&self) -> Result<Arc<dyn Transport>, TransportError>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Result<Arc<dyn Transport>, TransportError> + Send + Sync,
{
    fn build(&self) -> Result<Arc<dyn Transport>, TransportError> {
        self()
    }
}
