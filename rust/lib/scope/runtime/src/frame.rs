//! Frame header written in front of every payload.

use serde::{Deserialize, Serialize};

/// Message kind carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Call,
    Reply,
    Exception,
    Oneway,
}

/// Operation name, kind and sequence number of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub name: String,
    pub kind: MessageKind,
    pub seq: i32,
}

impl FrameHeader {
    pub fn new(name: impl Into<String>, kind: MessageKind, seq: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            seq,
        }
    }

    /// Header of a published message.
    pub fn call(name: impl Into<String>, seq: i32) -> Self {
        Self::new(name, MessageKind::Call, seq)
    }
}
