use std::sync::Arc;

use crate::error::RuntimeError;
use crate::protocol::Protocol;
use crate::transport::{Transport, TransportFactory};

/// Hands out fresh (transport, protocol) pairs.
///
/// Publishers build one client at construction; subscribers build one per
/// `subscribe` call.
#[derive(Clone)]
pub struct Provider {
    factory: Arc<dyn TransportFactory>,
}

impl Provider {
    pub fn new(factory: impl TransportFactory + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }

    pub fn build(&self) -> Result<Client, RuntimeError> {
        let transport = self.factory.build()?;
        Ok(Client::new(transport))
    }
}

/// A transport with the protocol layered on it.
pub struct Client {
    transport: Arc<dyn Transport>,
    protocol: Protocol,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let protocol = Protocol::new(Arc::clone(&transport));
        Self {
            transport,
            protocol,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }
}
