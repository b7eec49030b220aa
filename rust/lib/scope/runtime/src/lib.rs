//! scopegen-runtime: support library for generated Rust publishers and
//! subscribers.
//!
//! Generated `<Scope>Publisher` types wrap a [`PublisherCore`]; generated
//! `<Scope>Subscriber` types call [`subscriber::subscribe`] once per
//! operation. Both obtain their transports from a [`Provider`].
//!
//! ```
//! use scopegen_runtime::{build_topic, MemoryBroker, Provider, PublisherCore};
//!
//! let broker = MemoryBroker::new();
//! let provider = Provider::new(broker.clone());
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let sub = scopegen_runtime::subscribe(&provider, build_topic("", "Baz", "Qux"), "Qux", move |n: u32| {
//!     tx.send(n).unwrap();
//! })
//! .unwrap();
//!
//! let publisher = PublisherCore::new(&provider).unwrap();
//! publisher.publish("Baz.Qux", "Qux", &7u32).unwrap();
//! assert_eq!(rx.recv().unwrap(), 7);
//!
//! sub.unsubscribe().unwrap();
//! sub.join();
//! ```

pub mod error;
pub mod frame;
pub mod memory;
pub mod protocol;
pub mod provider;
pub mod publisher;
pub mod subscriber;
pub mod subscription;
pub mod transport;

pub use error::{
    ApplicationError, ApplicationErrorKind, RuntimeError, TransportError, TransportErrorKind,
};
pub use frame::{FrameHeader, MessageKind};
pub use memory::{MemoryBroker, MemoryTransport};
pub use protocol::Protocol;
pub use provider::{Client, Provider};
pub use publisher::PublisherCore;
pub use subscriber::{recv, subscribe};
pub use subscription::{Subscription, SubscriptionState};
pub use transport::{Transport, TransportFactory};

/// Separator between topic components. Matches the generator default.
pub const TOPIC_DELIMITER: &str = ".";

/// Join a resolved prefix, scope and operation into a topic.
///
/// `prefix` is the already-substituted prefix without its trailing
/// delimiter; an empty prefix contributes nothing.
pub fn build_topic(prefix: &str, scope: &str, op: &str) -> String {
    if prefix.is_empty() {
        format!("{}{}{}", scope, TOPIC_DELIMITER, op)
    } else {
        format!("{}{}{}{}{}", prefix, TOPIC_DELIMITER, scope, TOPIC_DELIMITER, op)
    }
}
