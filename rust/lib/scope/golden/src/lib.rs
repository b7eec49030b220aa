//! Golden output of the Rust target.
//!
//! The `*_publisher.rs` / `*_subscriber.rs` modules are checked-in generator
//! output for two reference scopes:
//!
//! - `Foo`, prefix `user.{id}`, operation `Bar(BarEvent)`
//! - `Baz`, empty prefix, operation `Qux(QuxEvent)`
//!
//! `scopegen-codegen-lib` fails its golden test if the renderer drifts from
//! these files; the tests here run them against the in-memory broker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEvent {
    pub x: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuxEvent {
    pub message: String,
}

pub mod baz_publisher;
pub mod baz_subscriber;
pub mod foo_publisher;
pub mod foo_subscriber;

pub use baz_publisher::BazPublisher;
pub use baz_subscriber::BazSubscriber;
pub use foo_publisher::FooPublisher;
pub use foo_subscriber::FooSubscriber;
