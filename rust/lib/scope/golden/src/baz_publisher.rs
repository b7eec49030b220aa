// Autogenerated by Scopegen Compiler (0.1.0)
// Generated on 2024-03-05
// DO NOT EDIT UNLESS YOU ARE SURE THAT YOU KNOW WHAT YOU ARE DOING

use scopegen_runtime::{Provider, PublisherCore, RuntimeError};

use super::*;

/// Topic delimiter these topics were generated with.
pub const DELIMITER: &str = ".";

/// Publishes `Baz` operations.
///
/// Safe to share between threads; publishes are serialized.
pub struct BazPublisher {
    core: PublisherCore,
}

impl BazPublisher {
    pub fn new(provider: &Provider) -> Result<Self, RuntimeError> {
        Ok(Self {
            core: PublisherCore::new(provider)?,
        })
    }

    /// Publishes `Qux` on `Baz.Qux`.
    pub fn publish_qux(&self, req: &QuxEvent) -> Result<(), RuntimeError> {
        let topic = String::from("Baz.Qux");
        self.core.publish(&topic, "Qux", req)
    }

    /// Last sequence number used.
    pub fn seq(&self) -> i32 {
        self.core.seq()
    }
}
