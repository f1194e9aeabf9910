//! Inverse-variance weighted averaging of position fixes.
//!
//! Each fix contributes with weight `1 / max(accuracy, floor)^2`, so a fix
//! with half the uncertainty radius counts four times as much. The floor
//! bounds the weight of implausibly precise fixes.

use crate::location::{Coordinate, PositionSample};

/// Weight of a single fix.
pub fn sample_weight(accuracy_m: f64, floor_m: f64) -> f64 {
    let effective = accuracy_m.max(floor_m);
    1.0 / (effective * effective)
}

/// Weighted mean coordinate of `samples`.
///
/// Returns `None` for an empty set or when the total weight is zero or not
/// finite.
pub fn weighted_average(samples: &[PositionSample], floor_m: f64) -> Option<Coordinate> {
    if samples.is_empty() {
        return None;
    }

    let (mut lat_sum, mut lon_sum, mut weight_sum) = (0.0_f64, 0.0_f64, 0.0_f64);
    for sample in samples {
        let weight = sample_weight(sample.horizontal_accuracy_m, floor_m);
        lat_sum += sample.latitude * weight;
        lon_sum += sample.longitude * weight;
        weight_sum += weight;
    }

    if !weight_sum.is_finite() || weight_sum <= 0.0 {
        return None;
    }

    Some(Coordinate::new(lat_sum / weight_sum, lon_sum / weight_sum))
}

/// Arithmetic mean of the accuracy radii.
pub fn mean_accuracy(samples: &[PositionSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().map(|s| s.horizontal_accuracy_m).sum();
    Some(sum / samples.len() as f64)
}
