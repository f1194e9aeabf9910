//! Live telemetry path: every fix is offered to the shaper, which forwards
//! at most one per minimum interval.

pub mod shaper;

pub use shaper::{LiveDecision, LiveTelemetryShaper};
