// Calibration module - reference point averaging
//
// This module provides the pieces of a calibration run:
// 1. CalibrationEngine: the Idle -> Running -> terminal state machine
// 2. weighted_average: inverse-variance averaging of accepted fixes
// 3. CalibrationProgress: UI-facing progress of the running run
//
// The workflow:
// 1. start(kind) arms a deadline
// 2. ingest() accepts fixes that pass the calibration gate
// 3. the run completes when min_good_samples is reached or the deadline
//    fires, whichever comes first; the other trigger becomes a no-op

pub mod average;
pub mod engine;
pub mod progress;
pub mod run;

pub use average::{mean_accuracy, sample_weight, weighted_average};
pub use engine::{CalibrationEngine, IngestOutcome, RunStart};
pub use progress::CalibrationProgress;
pub use run::{
    CalibrationKind, CalibrationOutcome, CalibrationResult, CalibrationRun, CalibrationStatus,
    RunId,
};
