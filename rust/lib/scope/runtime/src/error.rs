use thiserror::Error;

/// Classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The stream ended. Expected when a subscription is closed.
    EndOfFile,
    /// The transport is not subscribed / not prepared for the requested call.
    NotOpen,
    /// The transport refused the topic or the write.
    Rejected,
    /// Anything else reported by the underlying connection.
    Unknown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn end_of_file() -> Self {
        Self::new(TransportErrorKind::EndOfFile, "end of stream")
    }

    pub fn not_open(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotOpen, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Rejected, message)
    }

    pub fn is_end_of_file(&self) -> bool {
        self.kind == TransportErrorKind::EndOfFile
    }
}

/// Application-level protocol violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationErrorKind {
    /// A frame arrived for an operation other than the subscribed one.
    UnknownMethod,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("application error ({kind:?}): {message}")]
pub struct ApplicationError {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationError {
    pub fn unknown_method(expected: &str, received: &str) -> Self {
        Self {
            kind: ApplicationErrorKind::UnknownMethod,
            message: format!("expected operation '{}', received '{}'", expected, received),
        }
    }
}

/// Every error produced by generated publishers and subscribers.
///
/// `Clone` so a subscription can hand its terminal error to any number of
/// observers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("receive loop error: {0}")]
    Worker(String),
}

impl RuntimeError {
    /// True for the expected shutdown path.
    pub fn is_end_of_file(&self) -> bool {
        matches!(self, RuntimeError::Transport(e) if e.is_end_of_file())
    }

    /// True when the error is an "unknown method" protocol violation.
    pub fn is_unknown_method(&self) -> bool {
        matches!(
            self,
            RuntimeError::Application(ApplicationError {
                kind: ApplicationErrorKind::UnknownMethod,
                ..
            })
        )
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(e: serde_json::Error) -> Self {
        RuntimeError::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(RuntimeError::from(TransportError::end_of_file()).is_end_of_file());
        assert!(!RuntimeError::from(TransportError::rejected("x")).is_end_of_file());
        assert!(RuntimeError::from(ApplicationError::unknown_method("A", "B")).is_unknown_method());
        assert!(!RuntimeError::Protocol("bad".into()).is_unknown_method());
    }

    #[test]
    fn display() {
        let e = RuntimeError::from(ApplicationError::unknown_method("Bar", "Other"));
        assert_eq!(
            e.to_string(),
            "application error (UnknownMethod): expected operation 'Bar', received 'Other'"
        );
        let e = RuntimeError::from(TransportError::not_open("not subscribed"));
        assert_eq!(e.to_string(), "transport error (NotOpen): not subscribed");
    }
}
