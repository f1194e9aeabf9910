//! Async host for a [`Session`](crate::session::Session).
//!
//! The driver serializes sensor callbacks, timer callbacks and UI commands
//! through one event queue and executes the session's actions against the
//! platform collaborators.

pub mod clock;
pub mod collaborators;
pub mod driver;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{EventSink, NoopKeepAlive, SensorSource, SessionKeepAlive};
pub use driver::{Collaborators, SessionDriver, DEFAULT_TICK_INTERVAL};
