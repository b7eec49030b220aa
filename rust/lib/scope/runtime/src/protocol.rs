//! JSON frame codec layered on a [`Transport`].
//!
//! One transport message carries one frame:
//!
//! ```json
//! {"name": "Bar", "kind": "call", "seq": 1, "body": {"x": 1}}
//! ```
//!
//! The call sequence mirrors the header/payload/end structure every backend
//! generates: `write_message_begin` → `write_struct` → `write_message_end`,
//! and `read_message_begin` → `read_struct` | `skip_struct` → `read_message_end`.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RuntimeError, TransportError};
use crate::frame::FrameHeader;
use crate::transport::Transport;

#[derive(Serialize, Deserialize)]
struct WireMessage {
    #[serde(flatten)]
    header: FrameHeader,
    #[serde(default)]
    body: Value,
}

#[derive(Default)]
struct ProtocolState {
    /// Message being written: header plus body once serialized.
    outgoing: Option<(FrameHeader, Value)>,
    /// Body of the message being read.
    incoming: Option<Value>,
}

pub struct Protocol {
    transport: Arc<dyn Transport>,
    state: Mutex<ProtocolState>,
}

impl Protocol {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(ProtocolState::default()),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn state(&self) -> Result<MutexGuard<'_, ProtocolState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|_| RuntimeError::Protocol("protocol state poisoned".into()))
    }

    // ── Writing ─────────────────────────────────────────────────────

    pub fn write_message_begin(&self, header: &FrameHeader) -> Result<(), RuntimeError> {
        let mut state = self.state()?;
        if state.outgoing.is_some() {
            return Err(RuntimeError::Protocol(format!(
                "message '{}' started while another is open",
                header.name
            )));
        }
        state.outgoing = Some((header.clone(), Value::Null));
        Ok(())
    }

    pub fn write_struct<T: Serialize>(&self, value: &T) -> Result<(), RuntimeError> {
        let body = serde_json::to_value(value)?;
        let mut state = self.state()?;
        match state.outgoing.as_mut() {
            Some((_, slot)) => {
                *slot = body;
                Ok(())
            }
            None => Err(RuntimeError::Protocol("payload written outside a message".into())),
        }
    }

    /// Encode the open message and hand it to the transport.
    pub fn write_message_end(&self) -> Result<(), RuntimeError> {
        let (header, body) = self
            .state()?
            .outgoing
            .take()
            .ok_or_else(|| RuntimeError::Protocol("no message to end".into()))?;
        let bytes = serde_json::to_vec(&WireMessage { header, body })?;
        self.transport.write(&bytes)?;
        Ok(())
    }

    /// Drop a partially written message so the next `write_message_begin`
    /// starts clean.
    pub fn abort_message(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.outgoing = None;
        }
    }

    // ── Reading ─────────────────────────────────────────────────────

    /// Block for the next frame. End-of-stream surfaces as a
    /// `TransportErrorKind::EndOfFile` error.
    pub fn read_message_begin(&self) -> Result<FrameHeader, RuntimeError> {
        let bytes = self
            .transport
            .read()?
            .ok_or_else(TransportError::end_of_file)?;
        let message: WireMessage = serde_json::from_slice(&bytes)?;
        self.state()?.incoming = Some(message.body);
        Ok(message.header)
    }

    pub fn read_struct<T: DeserializeOwned>(&self) -> Result<T, RuntimeError> {
        let body = self
            .state()?
            .incoming
            .take()
            .ok_or_else(|| RuntimeError::Protocol("payload read outside a message".into()))?;
        Ok(serde_json::from_value(body)?)
    }

    /// Discard the current payload after checking it is struct-shaped.
    pub fn skip_struct(&self) -> Result<(), RuntimeError> {
        match self.state()?.incoming.take() {
            Some(Value::Object(_)) | Some(Value::Null) => Ok(()),
            Some(other) => Err(RuntimeError::Protocol(format!(
                "expected struct payload, found {}",
                other
            ))),
            None => Err(RuntimeError::Protocol("payload skipped outside a message".into())),
        }
    }

    pub fn read_message_end(&self) -> Result<(), RuntimeError> {
        self.state()?.incoming = None;
        Ok(())
    }
}
