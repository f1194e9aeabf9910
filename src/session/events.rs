//! Inputs to and outputs from [`Session::handle`](super::Session::handle).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationKind, CalibrationOutcome, RunId};
use crate::error::TransportError;
use crate::location::PositionSample;
use crate::transport::{MessageKind, OutboundMessage};

/// Location permission state reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    #[default]
    NotDetermined,
    Authorized,
    Denied,
    /// Blocked by policy; the user cannot grant it
    Restricted,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }

    pub fn is_refused(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted
        )
    }
}

/// Everything the host feeds into the session, one at a time
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AuthorizationChanged(AuthorizationStatus),
    StartAcquisition,
    StopAcquisition,
    Sample(PositionSample),
    /// Discrete sensor error; logged and surfaced, never retried
    SensorFailed { reason: String },
    StartCalibration(CalibrationKind),
    CancelCalibration,
    /// Deadline timer armed by `ArmDeadline` fired
    DeadlineElapsed { run_id: RunId },
    /// Periodic poll; completes a run whose deadline has passed
    Tick,
    RequestSubjectLock(bool),
    ReachabilityChanged(bool),
    DeliverySucceeded { kind: MessageKind },
    DeliveryFailed {
        kind: MessageKind,
        error: TransportError,
    },
}

/// Side effects the host must perform, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    Send(OutboundMessage),
    ArmDeadline { run_id: RunId, at: DateTime<Utc> },
    DisarmDeadline { run_id: RunId },
    RequestAuthorization,
    StartSensor,
    StopSensor,
    StartKeepalive,
    StopKeepalive,
    /// A run left Running; emitted exactly once per run
    CalibrationFinished(CalibrationOutcome),
}
