//! Interfaces of the platform services the driver talks to.
//!
//! Implementations push their output back through an [`EventSink`], so
//! sensor callbacks and timer callbacks end up serialized on the driver's
//! single event queue.

use tokio::sync::mpsc;

use crate::error::SensorError;
use crate::session::{AuthorizationStatus, SessionEvent};

/// Message on the driver queue
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DriverMessage {
    Event(SessionEvent),
    Shutdown,
}

/// Cloneable handle for pushing events into a running driver
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<DriverMessage>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<DriverMessage>) -> Self {
        Self { tx }
    }

    /// Queue one event
    ///
    /// Returns `false` once the driver is gone.
    pub fn push(&self, event: SessionEvent) -> bool {
        self.tx.send(DriverMessage::Event(event)).is_ok()
    }

    /// Ask the driver to stop after the events already queued
    pub fn shutdown(&self) -> bool {
        self.tx.send(DriverMessage::Shutdown).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Positioning sensor
pub trait SensorSource: Send + Sync {
    /// Current authorization status
    fn authorization(&self) -> AuthorizationStatus;

    /// Prompt the user; the answer arrives later as
    /// `SessionEvent::AuthorizationChanged`
    fn request_authorization(&self, sink: EventSink);

    /// Begin delivering `SessionEvent::Sample`s to `sink`
    ///
    /// # Errors
    /// - `AuthorizationDenied` or `Unavailable` if updates cannot start
    fn start_updates(&self, sink: EventSink) -> Result<(), SensorError>;

    fn stop_updates(&self);
}

/// Keeps the host process scheduled while acquisition runs
pub trait SessionKeepAlive: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Keepalive for hosts that need none
#[derive(Debug, Default)]
pub struct NoopKeepAlive;

impl SessionKeepAlive for NoopKeepAlive {
    fn start(&self) {
        log::debug!("[KeepAlive] start (noop)");
    }

    fn stop(&self) {
        log::debug!("[KeepAlive] stop (noop)");
    }
}
