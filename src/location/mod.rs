// Location module - position fixes and the shared sample validator
//
// Every fix goes through `SampleValidator` with the live-stream thresholds,
// and with the calibration thresholds while a run is running.

pub mod sample;
pub mod validation;

pub use sample::{Coordinate, PositionSample};
pub use validation::{
    sample_age_seconds, Rejection, RejectionKind, SampleValidator, ValidationThresholds,
};
