//! Outbound message payloads and their JSON wire shapes.
//!
//! Every message serializes as a single-key JSON object:
//!
//! ```text
//! {"locations":[{"lat":..,"lon":..,"ts":..,"acc":..}]}
//! {"centerCalibration":{"lat":..,"lon":..,"samples":..,"avgAccuracy":..}}
//! {"rigCalibration":{"lat":..,"lon":..,"samples":..,"avgAccuracy":..}}
//! {"lockSubject":true}
//! ```

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationKind, CalibrationResult};
use crate::location::PositionSample;

/// One live fix in wire form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveFix {
    pub lat: f64,
    pub lon: f64,
    /// Seconds since the Unix epoch
    pub ts: f64,
    /// Horizontal accuracy in meters
    pub acc: f64,
}

impl From<&PositionSample> for LiveFix {
    fn from(sample: &PositionSample) -> Self {
        Self {
            lat: sample.latitude,
            lon: sample.longitude,
            ts: sample.epoch_seconds(),
            acc: sample.horizontal_accuracy_m,
        }
    }
}

/// Calibration result in wire form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationPayload {
    pub lat: f64,
    pub lon: f64,
    pub samples: u32,
    pub avg_accuracy: f64,
}

impl From<&CalibrationResult> for CalibrationPayload {
    fn from(result: &CalibrationResult) -> Self {
        Self {
            lat: result.coordinate.latitude,
            lon: result.coordinate.longitude,
            samples: result.sample_count,
            avg_accuracy: result.average_accuracy_m,
        }
    }
}

/// Message handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutboundMessage {
    Locations(Vec<LiveFix>),
    CenterCalibration(CalibrationPayload),
    RigCalibration(CalibrationPayload),
    LockSubject(bool),
}

/// Discriminant of [`OutboundMessage`], used for delivery bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Locations,
    CenterCalibration,
    RigCalibration,
    LockSubject,
}

impl OutboundMessage {
    /// Live message carrying a single fix
    pub fn live(fix: LiveFix) -> Self {
        OutboundMessage::Locations(vec![fix])
    }

    /// Result notification tagged by calibration kind
    pub fn calibration(kind: CalibrationKind, result: &CalibrationResult) -> Self {
        let payload = CalibrationPayload::from(result);
        match kind {
            CalibrationKind::Center => OutboundMessage::CenterCalibration(payload),
            CalibrationKind::Rig => OutboundMessage::RigCalibration(payload),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundMessage::Locations(_) => MessageKind::Locations,
            OutboundMessage::CenterCalibration(_) => MessageKind::CenterCalibration,
            OutboundMessage::RigCalibration(_) => MessageKind::RigCalibration,
            OutboundMessage::LockSubject(_) => MessageKind::LockSubject,
        }
    }

    /// Wire encoding
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
