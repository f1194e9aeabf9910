// Sample validation shared by the calibration and live paths
//
// A fix is accepted only when its accuracy is positive and within the
// context's limit and its timestamp is within the context's age window.
// The age window is symmetric: fixes stamped in the future by a skewed
// clock are rejected exactly like old ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::location::PositionSample;

/// Accuracy and freshness limits for one validation context
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    /// Largest accepted horizontal accuracy radius in meters
    pub max_accuracy_m: f64,
    /// Largest accepted |now - timestamp| in seconds
    pub max_age_s: f64,
}

impl ValidationThresholds {
    pub fn new(max_accuracy_m: f64, max_age_s: f64) -> Self {
        Self {
            max_accuracy_m,
            max_age_s,
        }
    }

    /// Tight accuracy gate used while averaging reference points
    pub fn calibration_default() -> Self {
        Self::new(10.0, 5.0)
    }

    /// Looser accuracy gate with a shorter age window for live streaming
    pub fn live_default() -> Self {
        Self::new(25.0, 2.0)
    }
}

/// Why a fix was rejected
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Accuracy <= 0 (or not a number): the sensor flagged the fix invalid
    InvalidAccuracy { accuracy_m: f64 },
    /// Accuracy radius larger than the context allows
    PoorAccuracy { accuracy_m: f64, max_accuracy_m: f64 },
    /// Timestamp too far from now, in either direction
    Stale { age_s: f64, max_age_s: f64 },
    /// Coordinates not finite or outside degree ranges
    InvalidCoordinate { latitude: f64, longitude: f64 },
}

/// Field-free rejection label used for aggregate counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    InvalidAccuracy,
    PoorAccuracy,
    Stale,
    InvalidCoordinate,
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::InvalidAccuracy { .. } => RejectionKind::InvalidAccuracy,
            Rejection::PoorAccuracy { .. } => RejectionKind::PoorAccuracy,
            Rejection::Stale { .. } => RejectionKind::Stale,
            Rejection::InvalidCoordinate { .. } => RejectionKind::InvalidCoordinate,
        }
    }

    /// Short description for debug logging
    pub fn describe(&self) -> String {
        match self {
            Rejection::InvalidAccuracy { accuracy_m } => {
                format!("invalid accuracy {:.1} m", accuracy_m)
            }
            Rejection::PoorAccuracy {
                accuracy_m,
                max_accuracy_m,
            } => format!("accuracy {:.1} m above {:.1} m", accuracy_m, max_accuracy_m),
            Rejection::Stale { age_s, max_age_s } => {
                format!("age {:.2} s outside {:.2} s", age_s, max_age_s)
            }
            Rejection::InvalidCoordinate {
                latitude,
                longitude,
            } => format!("coordinate ({}, {}) out of range", latitude, longitude),
        }
    }
}

/// Absolute distance in seconds between `now` and the fix timestamp
pub fn sample_age_seconds(sample: &PositionSample, now: DateTime<Utc>) -> f64 {
    (now - sample.timestamp)
        .num_microseconds()
        .map(|us| (us as f64 / 1_000_000.0).abs())
        .unwrap_or(f64::INFINITY)
}

/// Validator for position fixes
pub struct SampleValidator;

impl SampleValidator {
    /// Validate a single fix
    ///
    /// # Arguments
    /// * `sample` - Fix to validate
    /// * `now` - Current wall-clock time
    /// * `thresholds` - Limits of the calling context
    ///
    /// # Returns
    /// * `Ok(())` - Fix accepted
    /// * `Err(Rejection)` - First gate the fix failed
    pub fn validate(
        sample: &PositionSample,
        now: DateTime<Utc>,
        thresholds: &ValidationThresholds,
    ) -> Result<(), Rejection> {
        if !sample.coordinate().is_valid() {
            return Err(Rejection::InvalidCoordinate {
                latitude: sample.latitude,
                longitude: sample.longitude,
            });
        }

        let accuracy_m = sample.horizontal_accuracy_m;
        if accuracy_m.is_nan() || accuracy_m <= 0.0 {
            return Err(Rejection::InvalidAccuracy { accuracy_m });
        }
        if accuracy_m > thresholds.max_accuracy_m {
            return Err(Rejection::PoorAccuracy {
                accuracy_m,
                max_accuracy_m: thresholds.max_accuracy_m,
            });
        }

        let age_s = sample_age_seconds(sample, now);
        if age_s > thresholds.max_age_s {
            return Err(Rejection::Stale {
                age_s,
                max_age_s: thresholds.max_age_s,
            });
        }

        Ok(())
    }

    /// Boolean form of [`SampleValidator::validate`]
    pub fn accept(
        sample: &PositionSample,
        now: DateTime<Utc>,
        thresholds: &ValidationThresholds,
    ) -> bool {
        Self::validate(sample, now, thresholds).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    /// Helper to build a fix `offset_ms` away from `now()`
    fn create_test_sample(accuracy_m: f64, offset_ms: i64) -> PositionSample {
        PositionSample::new(
            47.3769,
            8.5417,
            accuracy_m,
            now() + Duration::milliseconds(offset_ms),
        )
    }

    #[test]
    fn test_validate_valid_sample() {
        let thresholds = ValidationThresholds::new(10.0, 5.0);
        let sample = create_test_sample(3.0, -500);
        assert!(SampleValidator::validate(&sample, now(), &thresholds).is_ok());
        assert!(SampleValidator::accept(&sample, now(), &thresholds));
    }

    #[test]
    fn test_non_positive_accuracy_rejected_regardless_of_age() {
        let thresholds = ValidationThresholds::new(10.0, 5.0);
        for accuracy in [0.0, -1.0, -0.001, f64::NAN] {
            for offset_ms in [0, -100, 100, -60_000] {
                let sample = create_test_sample(accuracy, offset_ms);
                match SampleValidator::validate(&sample, now(), &thresholds) {
                    Err(Rejection::InvalidAccuracy { .. }) => {}
                    other => panic!(
                        "accuracy {} offset {} should be invalid, got {:?}",
                        accuracy, offset_ms, other
                    ),
                }
            }
        }
    }

    #[test]
    fn test_accuracy_above_context_limit_rejected() {
        let calibration = ValidationThresholds::calibration_default();
        let live = ValidationThresholds::live_default();
        let sample = create_test_sample(15.0, 0);

        assert!(matches!(
            SampleValidator::validate(&sample, now(), &calibration),
            Err(Rejection::PoorAccuracy { .. })
        ));
        assert!(SampleValidator::accept(&sample, now(), &live));
    }

    #[test]
    fn test_freshness_gate_is_symmetric() {
        let thresholds = ValidationThresholds::new(10.0, 2.0);
        let past = create_test_sample(3.0, -2_001);
        let future = create_test_sample(3.0, 2_001);

        let past_result = SampleValidator::validate(&past, now(), &thresholds);
        let future_result = SampleValidator::validate(&future, now(), &thresholds);
        assert!(matches!(past_result, Err(Rejection::Stale { .. })));
        assert!(matches!(future_result, Err(Rejection::Stale { .. })));

        if let (Err(Rejection::Stale { age_s: a, .. }), Err(Rejection::Stale { age_s: b, .. })) =
            (past_result, future_result)
        {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_validate_boundary_values() {
        // Exact limits are inside the accepted range
        let thresholds = ValidationThresholds::new(10.0, 2.0);
        assert!(SampleValidator::accept(
            &create_test_sample(10.0, -2_000),
            now(),
            &thresholds
        ));
        assert!(SampleValidator::accept(
            &create_test_sample(10.0, 2_000),
            now(),
            &thresholds
        ));
    }

    #[test]
    fn test_invalid_coordinate_rejected() {
        let thresholds = ValidationThresholds::new(10.0, 2.0);
        let mut sample = create_test_sample(3.0, 0);
        sample.latitude = 95.0;
        let result = SampleValidator::validate(&sample, now(), &thresholds);
        assert_eq!(
            result.map_err(|r| r.kind()),
            Err(RejectionKind::InvalidCoordinate)
        );
    }

    #[test]
    fn test_rejection_describe_mentions_values() {
        let rejection = Rejection::PoorAccuracy {
            accuracy_m: 12.5,
            max_accuracy_m: 10.0,
        };
        let text = rejection.describe();
        assert!(text.contains("12.5") && text.contains("10.0"));
    }
}
