// Autogenerated by Scopegen Compiler (0.1.0)
// Generated on 2024-03-05
// DO NOT EDIT UNLESS YOU ARE SURE THAT YOU KNOW WHAT YOU ARE DOING

use scopegen_runtime::{Provider, PublisherCore, RuntimeError};

use super::*;

/// Topic delimiter these topics were generated with.
pub const DELIMITER: &str = ".";

/// Publishes `Foo` operations.
///
/// Safe to share between threads; publishes are serialized.
pub struct FooPublisher {
    core: PublisherCore,
}

impl FooPublisher {
    pub fn new(provider: &Provider) -> Result<Self, RuntimeError> {
        Ok(Self {
            core: PublisherCore::new(provider)?,
        })
    }

    /// Publishes `Bar` on `user.{id}.Foo.Bar`.
    pub fn publish_bar(&self, id: &str, req: &BarEvent) -> Result<(), RuntimeError> {
        let topic = format!("user.{}.Foo.Bar", id);
        self.core.publish(&topic, "Bar", req)
    }

    /// Last sequence number used.
    pub fn seq(&self) -> i32 {
        self.core.seq()
    }
}
