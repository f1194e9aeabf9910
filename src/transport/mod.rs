// Transport module - point-to-point delivery to the companion controller
//
// The core never talks to a transport directly; the runtime driver holds an
// `Arc<dyn Transport>` and executes `Send` actions against it. Sends are
// fire-and-forget: a failure is reported once and never retried.

pub mod memory;
pub mod payload;

pub use memory::{RecordingTransport, StdoutTransport};
pub use payload::{CalibrationPayload, LiveFix, MessageKind, OutboundMessage};

use crate::error::TransportError;

/// Message link to the companion controller
pub trait Transport: Send + Sync {
    /// Whether the peer is currently reachable
    fn is_reachable(&self) -> bool;

    /// Deliver one message
    ///
    /// # Errors
    /// - `Unreachable` if the peer is not reachable; must fail immediately
    /// - `SendFailed` for any other delivery failure
    fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}
