// Transport error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Transport error code constants
///
/// Error code range: 3001-3002
pub struct TransportErrorCodes {}

impl TransportErrorCodes {
    /// Paired peer was not reachable at send time
    pub const UNREACHABLE: i32 = 3001;

    /// Send was attempted but the transport reported a failure
    pub const SEND_FAILED: i32 = 3002;
}

/// Log a transport error with structured context
///
/// Transport failures are expected in the field (watch out of range, phone
/// asleep) so they are logged at warn level, once per occurrence.
pub fn log_transport_error(err: &TransportError, context: &str) {
    warn!(
        "Transport error in {}: code={}, component=Transport, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported by the transport collaborator
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportError {
    /// Peer not reachable; nothing was sent
    Unreachable,

    /// Send attempted and failed
    SendFailed { reason: String },
}

impl ErrorCode for TransportError {
    fn code(&self) -> i32 {
        match self {
            TransportError::Unreachable => TransportErrorCodes::UNREACHABLE,
            TransportError::SendFailed { .. } => TransportErrorCodes::SEND_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            TransportError::Unreachable => "Companion device not reachable".to_string(),
            TransportError::SendFailed { reason } => format!("Send failed: {}", reason),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TransportError {}

/// Convert from std::io::Error to TransportError
impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::SendFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_codes() {
        assert_eq!(TransportError::Unreachable.code(), 3001);
        assert_eq!(
            TransportError::SendFailed {
                reason: "x".to_string()
            }
            .code(),
            3002
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: TransportError = io_err.into();

        match err {
            TransportError::SendFailed { reason } => assert!(reason.contains("pipe closed")),
            _ => panic!("Expected SendFailed variant"),
        }
    }
}
