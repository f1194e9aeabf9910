// Error types for the rig telemetry core
//
// This module defines the error types for calibration, transport and sensor
// operations. Each carries a stable numeric code so a companion app or a log
// scraper can react without parsing messages.

mod calibration;
mod sensor;
mod transport;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use sensor::{log_sensor_error, SensorError, SensorErrorCodes};
pub use transport::{log_transport_error, TransportError, TransportErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so status lines and logs stay consistent
/// across components.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
