// Autogenerated by Scopegen Compiler (0.1.0)
// Generated on 2024-03-05
// DO NOT EDIT UNLESS YOU ARE SURE THAT YOU KNOW WHAT YOU ARE DOING

use scopegen_runtime::{subscribe, Provider, RuntimeError, Subscription};

use super::*;

/// Topic delimiter these topics were generated with.
pub const DELIMITER: &str = ".";

/// Handles `Qux` messages.
pub trait QuxHandler: Send + 'static {
    fn on_qux(&mut self, req: QuxEvent);
}

impl<F> QuxHandler for F
where
    F: FnMut(QuxEvent) + Send + 'static,
{
    fn on_qux(&mut self, req: QuxEvent) {
        self(req)
    }
}

/// Subscribes to `Baz` operations.
#[derive(Clone)]
pub struct BazSubscriber {
    provider: Provider,
}

impl BazSubscriber {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    /// Delivers every `Qux` published on `Baz.Qux` to `handler` on a background thread.
    pub fn subscribe_qux<H: QuxHandler>(&self, mut handler: H) -> Result<Subscription, RuntimeError> {
        let topic = String::from("Baz.Qux");
        subscribe(&self.provider, topic, "Qux", move |req: QuxEvent| handler.on_qux(req))
    }
}
