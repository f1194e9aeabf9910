//! Calibration run identity, status and results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::location::{Coordinate, PositionSample};

/// Which reference point a run measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKind {
    /// Centre of the filming area
    Center,
    /// Position of the camera rig itself
    Rig,
}

impl CalibrationKind {
    /// Get human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            CalibrationKind::Center => "CENTER",
            CalibrationKind::Rig => "RIG",
        }
    }
}

impl std::str::FromStr for CalibrationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "center" | "centre" => Ok(CalibrationKind::Center),
            "rig" => Ok(CalibrationKind::Rig),
            other => Err(format!("unknown calibration kind '{}'", other)),
        }
    }
}

/// Monotonic identifier of a calibration run within one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Averaged reference point of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub coordinate: Coordinate,
    pub sample_count: u32,
    pub average_accuracy_m: f64,
}

/// Status of the engine's current (or last) run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalibrationStatus {
    /// No run has been started yet
    Idle,
    Running,
    Completed { result: CalibrationResult },
    Failed { reason: CalibrationError },
    Cancelled,
}

impl CalibrationStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, CalibrationStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CalibrationStatus::Completed { .. }
                | CalibrationStatus::Failed { .. }
                | CalibrationStatus::Cancelled
        )
    }

    /// Short label for status lines
    pub fn label(&self) -> &'static str {
        match self {
            CalibrationStatus::Idle => "idle",
            CalibrationStatus::Running => "running",
            CalibrationStatus::Completed { .. } => "completed",
            CalibrationStatus::Failed { .. } => "failed",
            CalibrationStatus::Cancelled => "cancelled",
        }
    }
}

/// One averaging session
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    pub(crate) id: RunId,
    pub(crate) kind: CalibrationKind,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) deadline: DateTime<Utc>,
    /// Accepted fixes in arrival order
    pub(crate) samples: Vec<PositionSample>,
    /// min(1, elapsed / max_duration) as of the last accepted fix
    pub(crate) progress: f64,
    pub(crate) status: CalibrationStatus,
}

impl CalibrationRun {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn kind(&self) -> CalibrationKind {
        self.kind
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    pub fn sample_count(&self) -> u32 {
        self.samples.len() as u32
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status(&self) -> &CalibrationStatus {
        &self.status
    }
}

/// Terminal result of a run, produced exactly once
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CalibrationOutcome {
    Completed {
        run_id: RunId,
        kind: CalibrationKind,
        result: CalibrationResult,
    },
    Failed {
        run_id: RunId,
        kind: CalibrationKind,
        reason: CalibrationError,
    },
}

impl CalibrationOutcome {
    pub fn run_id(&self) -> RunId {
        match self {
            CalibrationOutcome::Completed { run_id, .. }
            | CalibrationOutcome::Failed { run_id, .. } => *run_id,
        }
    }

    pub fn kind(&self) -> CalibrationKind {
        match self {
            CalibrationOutcome::Completed { kind, .. } | CalibrationOutcome::Failed { kind, .. } => {
                *kind
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CalibrationOutcome::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("center".parse::<CalibrationKind>(), Ok(CalibrationKind::Center));
        assert_eq!("RIG".parse::<CalibrationKind>(), Ok(CalibrationKind::Rig));
        assert!("tripod".parse::<CalibrationKind>().is_err());
        assert_eq!(CalibrationKind::Center.display_name(), "CENTER");
    }

    #[test]
    fn test_status_predicates() {
        assert!(CalibrationStatus::Running.is_running());
        assert!(!CalibrationStatus::Idle.is_terminal());
        assert!(CalibrationStatus::Cancelled.is_terminal());
        assert!(CalibrationStatus::Failed {
            reason: CalibrationError::NoAverage
        }
        .is_terminal());
        assert_eq!(CalibrationStatus::Running.label(), "running");
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let json = serde_json::to_value(CalibrationStatus::Cancelled).unwrap();
        assert_eq!(json["state"], "cancelled");
    }
}
