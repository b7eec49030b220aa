// Autogenerated by Scopegen Compiler (0.1.0)
// Generated on 2024-03-05
// DO NOT EDIT UNLESS YOU ARE SURE THAT YOU KNOW WHAT YOU ARE DOING

use scopegen_runtime::{subscribe, Provider, RuntimeError, Subscription};

use super::*;

/// Topic delimiter these topics were generated with.
pub const DELIMITER: &str = ".";

/// Handles `Bar` messages.
pub trait BarHandler: Send + 'static {
    fn on_bar(&mut self, req: BarEvent);
}

impl<F> BarHandler for F
where
    F: FnMut(BarEvent) + Send + 'static,
{
    fn on_bar(&mut self, req: BarEvent) {
        self(req)
    }
}

/// Subscribes to `Foo` operations.
#[derive(Clone)]
pub struct FooSubscriber {
    provider: Provider,
}

impl FooSubscriber {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    /// Delivers every `Bar` published on `user.{id}.Foo.Bar` to `handler` on a background thread.
    pub fn subscribe_bar<H: BarHandler>(&self, id: &str, mut handler: H) -> Result<Subscription, RuntimeError> {
        let topic = format!("user.{}.Foo.Bar", id);
        subscribe(&self.provider, topic, "Bar", move |req: BarEvent| handler.on_bar(req))
    }
}
