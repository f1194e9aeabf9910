// CalibrationEngine - bounded-duration averaging state machine
//
// States: Idle -> Running -> {Completed, Failed, Cancelled}. A run is ended
// by whichever trigger arrives first: the sample count reaching
// `min_good_samples` during `ingest`, or the deadline. Both triggers go
// through `finish_running`, which only acts while the run with the given id
// is still Running, so the slower trigger becomes a no-op.

use chrono::{DateTime, Utc};

use crate::calibration::average::{mean_accuracy, weighted_average};
use crate::calibration::progress::CalibrationProgress;
use crate::calibration::run::{
    CalibrationKind, CalibrationOutcome, CalibrationResult, CalibrationRun, CalibrationStatus,
    RunId,
};
use crate::config::{CalibrationConfig, StartPolicy};
use crate::error::{log_calibration_error, CalibrationError, ErrorCode};
use crate::location::{PositionSample, Rejection, SampleValidator};

/// Upper bound on the sample buffer reserved up front
const INITIAL_SAMPLE_CAPACITY: usize = 64;

/// Returned by [`CalibrationEngine::start`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunStart {
    pub run_id: RunId,
    pub kind: CalibrationKind,
    /// When the host should fire `deadline_elapsed`
    pub deadline: DateTime<Utc>,
    /// Run cancelled to make room, under `StartPolicy::CancelActive`
    pub cancelled: Option<RunId>,
}

/// Result of feeding one fix to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// No run is running; the fix was not looked at
    Idle,
    /// Fix failed the calibration gate
    Rejected(Rejection),
    /// Fix appended to the running run
    Accepted { collected: u32, progress: f64 },
    /// Fix was accepted and completed the run
    Finished(CalibrationOutcome),
}

/// CalibrationEngine owns at most one run at a time
pub struct CalibrationEngine {
    config: CalibrationConfig,
    run: Option<CalibrationRun>,
    next_run_id: u64,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            run: None,
            next_run_id: 1,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Status of the current or most recent run
    pub fn status(&self) -> CalibrationStatus {
        self.run
            .as_ref()
            .map(|run| run.status.clone())
            .unwrap_or(CalibrationStatus::Idle)
    }

    /// Current or most recent run
    pub fn current_run(&self) -> Option<&CalibrationRun> {
        self.run.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.active_run_id().is_some()
    }

    /// Id of the run that is Running, if any
    pub fn active_run_id(&self) -> Option<RunId> {
        self.run
            .as_ref()
            .filter(|run| run.status.is_running())
            .map(|run| run.id)
    }

    /// Start a new run
    ///
    /// # Errors
    /// - `AlreadyRunning` when a run is running and the policy is `Reject`
    pub fn start(
        &mut self,
        kind: CalibrationKind,
        now: DateTime<Utc>,
    ) -> Result<RunStart, CalibrationError> {
        let mut cancelled = None;
        if self.is_running() {
            match self.config.start_policy {
                StartPolicy::Reject => {
                    let err = CalibrationError::AlreadyRunning;
                    log_calibration_error(&err, "start_calibration");
                    return Err(err);
                }
                StartPolicy::CancelActive => {
                    cancelled = Some(self.cancel()?);
                }
            }
        }

        let run_id = RunId(self.next_run_id);
        self.next_run_id += 1;
        let deadline = now
            .checked_add_signed(self.config.max_duration())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.run = Some(CalibrationRun {
            id: run_id,
            kind,
            started_at: now,
            deadline,
            samples: Vec::with_capacity(
                (self.config.min_good_samples as usize).min(INITIAL_SAMPLE_CAPACITY),
            ),
            progress: 0.0,
            status: CalibrationStatus::Running,
        });

        log::info!(
            "[CalibrationEngine] Started {} run {} (need {} fixes, deadline {})",
            kind.display_name(),
            run_id,
            self.config.min_good_samples,
            deadline.to_rfc3339()
        );

        Ok(RunStart {
            run_id,
            kind,
            deadline,
            cancelled,
        })
    }

    /// Offer a fix to the running run
    pub fn ingest(&mut self, sample: &PositionSample, now: DateTime<Utc>) -> IngestOutcome {
        let max_duration_ms = self.config.max_duration_ms as f64;
        let min_good_samples = self.config.min_good_samples;

        let Some(run) = self.run.as_mut().filter(|run| run.status.is_running()) else {
            return IngestOutcome::Idle;
        };

        if let Err(rejection) = SampleValidator::validate(sample, now, &self.config.thresholds) {
            log::debug!(
                "[CalibrationEngine] Run {} rejected fix: {}",
                run.id,
                rejection.describe()
            );
            return IngestOutcome::Rejected(rejection);
        }

        run.samples.push(*sample);
        let elapsed_ms = (now - run.started_at).num_milliseconds() as f64;
        run.progress = (elapsed_ms / max_duration_ms).clamp(0.0, 1.0);
        let collected = run.sample_count();
        let run_id = run.id;

        if collected >= min_good_samples {
            if let Some(outcome) = self.finish_running(run_id) {
                return IngestOutcome::Finished(outcome);
            }
        }

        IngestOutcome::Accepted {
            collected,
            progress: self.run.as_ref().map(|r| r.progress).unwrap_or_default(),
        }
    }

    /// Status of `run_id`
    ///
    /// # Errors
    /// - `UnknownRun` if `run_id` is not the engine's current run
    pub fn run_status(&self, run_id: RunId) -> Result<&CalibrationStatus, CalibrationError> {
        self.run
            .as_ref()
            .filter(|run| run.id == run_id)
            .map(|run| &run.status)
            .ok_or(CalibrationError::UnknownRun { run_id: run_id.0 })
    }

    /// Deadline timer for `run_id` fired
    ///
    /// Completes the run with whatever was collected. Returns `None` when the
    /// run already left Running or is not the current run.
    pub fn deadline_elapsed(
        &mut self,
        run_id: RunId,
        now: DateTime<Utc>,
    ) -> Option<CalibrationOutcome> {
        if let Err(err) = self.run_status(run_id) {
            log::debug!("[CalibrationEngine] Ignoring deadline: {}", err.message());
            return None;
        }
        if let Some(run) = self.run.as_mut().filter(|run| run.status.is_running()) {
            log::info!(
                "[CalibrationEngine] Deadline reached for run {} at {} with {} fixes",
                run_id,
                now.to_rfc3339(),
                run.samples.len()
            );
            run.progress = 1.0;
        }
        self.finish_running(run_id)
    }

    /// Polling form of the deadline: fires when `now` is at or past the
    /// running run's deadline
    pub fn poll_deadline(&mut self, now: DateTime<Utc>) -> Option<CalibrationOutcome> {
        let run_id = self
            .run
            .as_ref()
            .filter(|run| run.status.is_running() && now >= run.deadline)
            .map(|run| run.id)?;
        self.deadline_elapsed(run_id, now)
    }

    /// Cancel the running run, discarding its samples
    ///
    /// # Errors
    /// - `NotRunning` if no run is running
    pub fn cancel(&mut self) -> Result<RunId, CalibrationError> {
        match self.run.as_mut().filter(|run| run.status.is_running()) {
            Some(run) => {
                run.samples.clear();
                run.status = CalibrationStatus::Cancelled;
                log::info!("[CalibrationEngine] Cancelled run {}", run.id);
                Ok(run.id)
            }
            None => Err(CalibrationError::NotRunning),
        }
    }

    /// Progress of the running run as of `now`
    pub fn progress(&self, now: DateTime<Utc>) -> Option<CalibrationProgress> {
        let run = self.run.as_ref().filter(|run| run.status.is_running())?;
        let elapsed_ms = (now - run.started_at).num_milliseconds() as f64;
        Some(CalibrationProgress::new(
            run.id,
            run.kind,
            run.sample_count(),
            self.config.min_good_samples,
            elapsed_ms / self.config.max_duration_ms as f64,
        ))
    }

    /// The single exit from Running
    ///
    /// Check-and-set on (run id, Running). Whichever trigger calls this first
    /// gets the outcome; every later call for the same run returns `None`.
    fn finish_running(&mut self, run_id: RunId) -> Option<CalibrationOutcome> {
        let min_good_samples = self.config.min_good_samples;
        let floor_m = self.config.weight_floor_m;

        let run = self
            .run
            .as_mut()
            .filter(|run| run.id == run_id && run.status.is_running())?;

        let collected = run.sample_count();
        let outcome = if collected < min_good_samples {
            CalibrationOutcome::Failed {
                run_id,
                kind: run.kind,
                reason: CalibrationError::InsufficientSamples {
                    required: min_good_samples,
                    collected,
                },
            }
        } else {
            match (
                weighted_average(&run.samples, floor_m),
                mean_accuracy(&run.samples),
            ) {
                (Some(coordinate), Some(average_accuracy_m)) => CalibrationOutcome::Completed {
                    run_id,
                    kind: run.kind,
                    result: CalibrationResult {
                        coordinate,
                        sample_count: collected,
                        average_accuracy_m,
                    },
                },
                _ => CalibrationOutcome::Failed {
                    run_id,
                    kind: run.kind,
                    reason: CalibrationError::NoAverage,
                },
            }
        };

        run.status = match &outcome {
            CalibrationOutcome::Completed { result, .. } => CalibrationStatus::Completed {
                result: result.clone(),
            },
            CalibrationOutcome::Failed { reason, .. } => {
                log_calibration_error(reason, "finish_calibration");
                CalibrationStatus::Failed {
                    reason: reason.clone(),
                }
            }
        };

        if let CalibrationOutcome::Completed { kind, result, .. } = &outcome {
            log::info!(
                "[CalibrationEngine] {} run {} completed: ({:.7}, {:.7}) from {} fixes, avg accuracy {:.2} m",
                kind.display_name(),
                run_id,
                result.coordinate.latitude,
                result.coordinate.longitude,
                result.sample_count,
                result.average_accuracy_m
            );
        }

        Some(outcome)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
