// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2006
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Run ended with fewer accepted samples than required
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// Weighted average was degenerate (no samples or zero weight)
    pub const NO_AVERAGE: i32 = 2002;

    /// A calibration run is already running
    pub const ALREADY_RUNNING: i32 = 2003;

    /// No calibration run is running
    pub const NOT_RUNNING: i32 = 2004;

    /// Trigger referenced a run that is not the current one
    pub const UNKNOWN_RUN: i32 = 2005;

    /// Calibration configuration is unusable
    pub const INVALID_CONFIG: i32 = 2006;
}

/// Log a calibration error with structured context
///
/// Logs the numeric code, the component and the human-readable message
/// together with the caller-supplied context string.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// `InsufficientSamples` and `NoAverage` double as terminal failure reasons
/// of a run; the others are returned from engine operations.
///
/// Error code range: 2001-2006
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationError {
    /// Run ended with too few accepted samples
    InsufficientSamples { required: u32, collected: u32 },

    /// Weighted average could not be computed
    NoAverage,

    /// A run is already in progress
    AlreadyRunning,

    /// No run is in progress
    NotRunning,

    /// A trigger arrived for a run that is no longer current
    UnknownRun { run_id: u64 },

    /// Configuration rejected by validation
    InvalidConfig { reason: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::NoAverage => CalibrationErrorCodes::NO_AVERAGE,
            CalibrationError::AlreadyRunning => CalibrationErrorCodes::ALREADY_RUNNING,
            CalibrationError::NotRunning => CalibrationErrorCodes::NOT_RUNNING,
            CalibrationError::UnknownRun { .. } => CalibrationErrorCodes::UNKNOWN_RUN,
            CalibrationError::InvalidConfig { .. } => CalibrationErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!("Insufficient samples: need {}, got {}", required, collected)
            }
            CalibrationError::NoAverage => {
                "Could not compute an average position from the collected fixes".to_string()
            }
            CalibrationError::AlreadyRunning => "Calibration already running".to_string(),
            CalibrationError::NotRunning => "No calibration running".to_string(),
            CalibrationError::UnknownRun { run_id } => {
                format!("Calibration run {} is not the active run", run_id)
            }
            CalibrationError::InvalidConfig { reason } => {
                format!("Invalid calibration config: {}", reason)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
