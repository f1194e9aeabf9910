// Progress tracking for the calibration workflow
//
// This module provides the progress view of the running calibration that the
// presentation layer polls or subscribes to.

use crate::calibration::run::{CalibrationKind, RunId};

/// Progress information for the running calibration
///
/// Time progress and sample progress are reported separately: a run ends on
/// whichever of the two reaches 100% first.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationProgress {
    /// Run this progress belongs to
    pub run_id: RunId,
    /// Reference point being measured
    pub kind: CalibrationKind,
    /// Accepted fixes so far
    pub samples_collected: u32,
    /// Accepted fixes needed for early completion
    pub samples_needed: u32,
    /// min(1, elapsed / max_duration)
    pub elapsed_fraction: f64,
}

impl CalibrationProgress {
    /// Create a new progress instance
    ///
    /// # Arguments
    /// * `run_id` - Run being reported
    /// * `kind` - Reference point being measured
    /// * `samples_collected` - Number of fixes accepted so far
    /// * `samples_needed` - Fixes needed to finish early
    /// * `elapsed_fraction` - Share of the deadline already used (clamped to 0..=1)
    pub fn new(
        run_id: RunId,
        kind: CalibrationKind,
        samples_collected: u32,
        samples_needed: u32,
        elapsed_fraction: f64,
    ) -> Self {
        Self {
            run_id,
            kind,
            samples_collected,
            samples_needed,
            elapsed_fraction: elapsed_fraction.clamp(0.0, 1.0),
        }
    }

    /// Check if enough samples were collected to finish early
    pub fn has_enough_samples(&self) -> bool {
        self.samples_collected >= self.samples_needed
    }

    /// Sample progress percentage (0-100)
    pub fn sample_percentage(&self) -> u8 {
        if self.samples_needed == 0 {
            return 0;
        }
        let ratio = (self.samples_collected as f64 / self.samples_needed as f64).min(1.0);
        (ratio * 100.0) as u8
    }

    /// Time progress percentage (0-100)
    pub fn percentage(&self) -> u8 {
        (self.elapsed_fraction * 100.0) as u8
    }
}
