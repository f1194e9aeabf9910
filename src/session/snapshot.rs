//! Plain UI-facing state, published after every handled event.

use serde::Serialize;

use crate::calibration::{CalibrationKind, CalibrationResult, RunId};
use crate::location::{PositionSample, RejectionKind};

use super::events::AuthorizationStatus;

/// Rejections by gate, both paths combined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub invalid_accuracy: u64,
    pub poor_accuracy: u64,
    pub stale: u64,
    pub invalid_coordinate: u64,
}

impl RejectionCounts {
    pub fn record(&mut self, kind: RejectionKind) {
        let slot = match kind {
            RejectionKind::InvalidAccuracy => &mut self.invalid_accuracy,
            RejectionKind::PoorAccuracy => &mut self.poor_accuracy,
            RejectionKind::Stale => &mut self.stale,
            RejectionKind::InvalidCoordinate => &mut self.invalid_coordinate,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u64 {
        self.invalid_accuracy + self.poor_accuracy + self.stale + self.invalid_coordinate
    }
}

/// Aggregate counters since the session was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounters {
    pub samples_seen: u64,
    pub calibration_accepted: u64,
    pub calibration_rejected: u64,
    pub live_forwarded: u64,
    pub live_throttled: u64,
    pub live_rejected: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub sensor_faults: u64,
    pub rejections: RejectionCounts,
}

/// Calibration part of the snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationView {
    pub run_id: Option<RunId>,
    pub kind: Option<CalibrationKind>,
    /// `idle`, `running`, `completed`, `failed` or `cancelled`
    pub status: &'static str,
    pub samples_collected: u32,
    pub samples_needed: u32,
    /// Elapsed share of the deadline, 1.0 once the run has ended
    pub progress: f64,
    /// Human-readable reason of a failed run
    pub failure: Option<String>,
}

impl CalibrationView {
    pub fn idle(samples_needed: u32) -> Self {
        Self {
            run_id: None,
            kind: None,
            status: "idle",
            samples_collected: 0,
            samples_needed,
            progress: 0.0,
            failure: None,
        }
    }
}

/// Everything a presentation layer needs to render the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub acquiring: bool,
    pub authorization: AuthorizationStatus,
    pub calibration: CalibrationView,
    pub last_center: Option<CalibrationResult>,
    pub last_rig: Option<CalibrationResult>,
    pub last_fix: Option<PositionSample>,
    pub reachable: bool,
    pub subject_locked: Option<bool>,
    pub status_message: Option<String>,
    pub counters: SessionCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_counts_by_kind() {
        let mut counts = RejectionCounts::default();
        counts.record(RejectionKind::Stale);
        counts.record(RejectionKind::Stale);
        counts.record(RejectionKind::PoorAccuracy);
        assert_eq!(counts.stale, 2);
        assert_eq!(counts.poor_accuracy, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn idle_view_serializes() {
        let value = serde_json::to_value(CalibrationView::idle(10)).unwrap();
        assert_eq!(value["status"], "idle");
        assert_eq!(value["samples_needed"], 10);
        assert!(value["run_id"].is_null());
    }
}
