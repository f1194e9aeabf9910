//! Core telemetry event types describing diagnostics data exposed to the
//! CLI and debug HTTP surfaces.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationKind;
use crate::transport::MessageKind;

/// Metric events covering the live stream, calibration runs, and faults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    LiveForwarded {
        lat: f64,
        lon: f64,
        acc: f64,
    },
    /// Rolling spacing between forwarded live fixes
    LiveInterval {
        avg_ms: f64,
        max_ms: f64,
        min_ms: f64,
        sample_count: usize,
    },
    CalibrationStarted {
        run_id: u64,
        deadline_ms: i64,
    },
    CalibrationFinished {
        run_id: u64,
        kind: CalibrationKind,
        completed: bool,
        sample_count: Option<u32>,
        detail: Option<String>,
    },
    DeliveryFailed {
        kind: MessageKind,
        code: i32,
        message: String,
    },
    SensorFault {
        code: i32,
        message: String,
    },
}
