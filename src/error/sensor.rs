// Sensor error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Sensor error code constants
///
/// Error code range: 4001-4003
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// User or platform denied location access
    pub const AUTHORIZATION_DENIED: i32 = 4001;

    /// Location services unavailable on this device
    pub const UNAVAILABLE: i32 = 4002;

    /// Sensor reported a runtime failure
    pub const FAILED: i32 = 4003;
}

/// Log a sensor error with structured context
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, component=LocationSensor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported by the positioning sensor or keepalive collaborator
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorError {
    /// Location access denied or restricted
    AuthorizationDenied,

    /// Location hardware or service not available
    Unavailable { reason: String },

    /// Runtime failure while delivering fixes
    Failed { reason: String },
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::AuthorizationDenied => SensorErrorCodes::AUTHORIZATION_DENIED,
            SensorError::Unavailable { .. } => SensorErrorCodes::UNAVAILABLE,
            SensorError::Failed { .. } => SensorErrorCodes::FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::AuthorizationDenied => "Location access denied".to_string(),
            SensorError::Unavailable { reason } => {
                format!("Location unavailable: {}", reason)
            }
            SensorError::Failed { reason } => format!("Location error: {}", reason),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}
