// Session - the single owner of all mutable telemetry state
//
// The session is driven one event at a time and never performs I/O. Each
// call to `handle` returns the actions the host must execute, in order.
// Samples fan out to the calibration engine (only while a run is running)
// and to the live shaper (always).

use chrono::{DateTime, Utc};

use crate::calibration::{
    CalibrationEngine, CalibrationKind, CalibrationOutcome, CalibrationResult, CalibrationStatus,
    IngestOutcome,
};
use crate::config::AppConfig;
use crate::error::{log_transport_error, ErrorCode};
use crate::live::{LiveDecision, LiveTelemetryShaper};
use crate::location::{PositionSample, Rejection};
use crate::transport::OutboundMessage;

use super::events::{AuthorizationStatus, SessionAction, SessionEvent};
use super::snapshot::{CalibrationView, SessionCounters, SessionSnapshot};

const ACCESS_DENIED: &str = "Location access denied";

/// Event-driven telemetry session
pub struct Session {
    engine: CalibrationEngine,
    shaper: LiveTelemetryShaper,
    authorization: AuthorizationStatus,
    acquiring: bool,
    /// Authorization was requested for a pending start; cleared on any answer
    awaiting_authorization: bool,
    reachable: bool,
    subject_locked: Option<bool>,
    last_fix: Option<PositionSample>,
    last_center: Option<CalibrationResult>,
    last_rig: Option<CalibrationResult>,
    status_message: Option<String>,
    counters: SessionCounters,
}

impl Session {
    /// Build a session; a config failing [`AppConfig::validate`] is replaced
    /// by the defaults, as when loading from a file
    pub fn new(config: AppConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                log::warn!("[Session] {}. Using defaults.", err.message());
                AppConfig::default()
            }
        };

        Self {
            shaper: LiveTelemetryShaper::new(&config.live),
            engine: CalibrationEngine::new(config.calibration),
            authorization: AuthorizationStatus::NotDetermined,
            acquiring: false,
            awaiting_authorization: false,
            reachable: true,
            subject_locked: None,
            last_fix: None,
            last_center: None,
            last_rig: None,
            status_message: None,
            counters: SessionCounters::default(),
        }
    }

    pub fn engine(&self) -> &CalibrationEngine {
        &self.engine
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Handle one event and return the actions to execute
    pub fn handle(&mut self, event: SessionEvent, now: DateTime<Utc>) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        match event {
            SessionEvent::AuthorizationChanged(status) => {
                self.on_authorization(status, &mut actions)
            }
            SessionEvent::StartAcquisition => self.on_start_acquisition(&mut actions),
            SessionEvent::StopAcquisition => self.on_stop_acquisition(&mut actions),
            SessionEvent::Sample(sample) => self.on_sample(sample, now, &mut actions),
            SessionEvent::SensorFailed { reason } => {
                log::warn!("[Session] Sensor reported an error: {}", reason);
                self.counters.sensor_faults += 1;
                self.status_message = Some(format!("Sensor error: {}", reason));
            }
            SessionEvent::StartCalibration(kind) => {
                self.on_start_calibration(kind, now, &mut actions)
            }
            SessionEvent::CancelCalibration => self.cancel_calibration(&mut actions),
            SessionEvent::DeadlineElapsed { run_id } => {
                if let Some(outcome) = self.engine.deadline_elapsed(run_id, now) {
                    self.finish_calibration(outcome, &mut actions);
                }
            }
            SessionEvent::Tick => {
                if let Some(outcome) = self.engine.poll_deadline(now) {
                    actions.push(SessionAction::DisarmDeadline {
                        run_id: outcome.run_id(),
                    });
                    self.finish_calibration(outcome, &mut actions);
                }
            }
            SessionEvent::RequestSubjectLock(locked) => {
                self.subject_locked = Some(locked);
                actions.push(SessionAction::Send(OutboundMessage::LockSubject(locked)));
            }
            SessionEvent::ReachabilityChanged(reachable) => {
                if reachable != self.reachable {
                    log::info!("[Session] Companion reachable: {}", reachable);
                }
                self.reachable = reachable;
            }
            SessionEvent::DeliverySucceeded { .. } => {
                self.counters.deliveries_succeeded += 1;
            }
            SessionEvent::DeliveryFailed { kind, error } => {
                log_transport_error(&error, &format!("deliver {:?}", kind));
                self.counters.deliveries_failed += 1;
                self.status_message = Some(error.message());
            }
        }

        actions
    }

    /// Current UI state
    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            acquiring: self.acquiring,
            authorization: self.authorization,
            calibration: self.calibration_view(now),
            last_center: self.last_center.clone(),
            last_rig: self.last_rig.clone(),
            last_fix: self.last_fix,
            reachable: self.reachable,
            subject_locked: self.subject_locked,
            status_message: self.status_message.clone(),
            counters: self.counters.clone(),
        }
    }

    fn on_authorization(&mut self, status: AuthorizationStatus, actions: &mut Vec<SessionAction>) {
        log::info!("[Session] Authorization changed to {:?}", status);
        self.authorization = status;

        if status.is_refused() {
            self.awaiting_authorization = false;
            self.status_message = Some(ACCESS_DENIED.to_string());
            if self.acquiring {
                self.stop_acquiring(actions);
            }
        } else if status.is_authorized() && self.awaiting_authorization {
            self.awaiting_authorization = false;
            self.start_acquiring(actions);
        }
    }

    fn on_start_acquisition(&mut self, actions: &mut Vec<SessionAction>) {
        if self.acquiring {
            return;
        }

        match self.authorization {
            AuthorizationStatus::Authorized => self.start_acquiring(actions),
            AuthorizationStatus::NotDetermined => {
                // One prompt per pending start
                if !self.awaiting_authorization {
                    self.awaiting_authorization = true;
                    actions.push(SessionAction::RequestAuthorization);
                }
            }
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                log::warn!("[Session] Acquisition not started: location access denied");
                self.status_message = Some(ACCESS_DENIED.to_string());
            }
        }
    }

    fn on_stop_acquisition(&mut self, actions: &mut Vec<SessionAction>) {
        self.awaiting_authorization = false;
        if !self.acquiring {
            return;
        }
        // No fixes can arrive once the sensor is stopped
        if self.engine.is_running() {
            self.cancel_calibration(actions);
        }
        self.stop_acquiring(actions);
    }

    fn start_acquiring(&mut self, actions: &mut Vec<SessionAction>) {
        log::info!("[Session] Starting acquisition");
        self.acquiring = true;
        self.shaper.reset();
        actions.push(SessionAction::StartSensor);
        actions.push(SessionAction::StartKeepalive);
    }

    fn stop_acquiring(&mut self, actions: &mut Vec<SessionAction>) {
        log::info!("[Session] Stopping acquisition");
        self.acquiring = false;
        actions.push(SessionAction::StopSensor);
        actions.push(SessionAction::StopKeepalive);
    }

    fn on_sample(
        &mut self,
        sample: PositionSample,
        now: DateTime<Utc>,
        actions: &mut Vec<SessionAction>,
    ) {
        self.counters.samples_seen += 1;
        self.last_fix = Some(sample);

        match self.engine.ingest(&sample, now) {
            IngestOutcome::Idle => {}
            IngestOutcome::Rejected(rejection) => {
                self.counters.calibration_rejected += 1;
                self.count_rejection(&rejection);
            }
            IngestOutcome::Accepted { .. } => {
                self.counters.calibration_accepted += 1;
            }
            IngestOutcome::Finished(outcome) => {
                self.counters.calibration_accepted += 1;
                actions.push(SessionAction::DisarmDeadline {
                    run_id: outcome.run_id(),
                });
                self.finish_calibration(outcome, actions);
            }
        }

        match self.shaper.offer(&sample, now) {
            LiveDecision::Forward { fix, .. } => {
                self.counters.live_forwarded += 1;
                actions.push(SessionAction::Send(OutboundMessage::live(fix)));
            }
            LiveDecision::Throttled => self.counters.live_throttled += 1,
            LiveDecision::Rejected(rejection) => {
                self.counters.live_rejected += 1;
                self.count_rejection(&rejection);
            }
        }
    }

    fn count_rejection(&mut self, rejection: &Rejection) {
        self.counters.rejections.record(rejection.kind());
    }

    fn on_start_calibration(
        &mut self,
        kind: CalibrationKind,
        now: DateTime<Utc>,
        actions: &mut Vec<SessionAction>,
    ) {
        match self.engine.start(kind, now) {
            Ok(start) => {
                if let Some(cancelled) = start.cancelled {
                    actions.push(SessionAction::DisarmDeadline { run_id: cancelled });
                }
                actions.push(SessionAction::ArmDeadline {
                    run_id: start.run_id,
                    at: start.deadline,
                });
                self.status_message = Some(format!("Calibrating {}", kind.display_name()));
            }
            Err(err) => {
                self.status_message = Some(err.message());
            }
        }
    }

    fn cancel_calibration(&mut self, actions: &mut Vec<SessionAction>) {
        match self.engine.cancel() {
            Ok(run_id) => {
                actions.push(SessionAction::DisarmDeadline { run_id });
                self.status_message = Some("Calibration cancelled".to_string());
            }
            Err(err) => {
                log::debug!("[Session] Cancel ignored: {}", err.message());
            }
        }
    }

    fn finish_calibration(&mut self, outcome: CalibrationOutcome, actions: &mut Vec<SessionAction>) {
        match &outcome {
            CalibrationOutcome::Completed { kind, result, .. } => {
                match kind {
                    CalibrationKind::Center => self.last_center = Some(result.clone()),
                    CalibrationKind::Rig => self.last_rig = Some(result.clone()),
                }
                self.status_message = Some(format!(
                    "{} calibrated from {} fixes (avg accuracy {:.1} m)",
                    kind.display_name(),
                    result.sample_count,
                    result.average_accuracy_m
                ));
                actions.push(SessionAction::Send(OutboundMessage::calibration(
                    *kind, result,
                )));
            }
            CalibrationOutcome::Failed { kind, reason, .. } => {
                self.status_message = Some(format!(
                    "{} calibration failed: {}",
                    kind.display_name(),
                    reason.message()
                ));
            }
        }
        actions.push(SessionAction::CalibrationFinished(outcome));
    }

    fn calibration_view(&self, now: DateTime<Utc>) -> CalibrationView {
        let samples_needed = self.engine.config().min_good_samples;
        let Some(run) = self.engine.current_run() else {
            return CalibrationView::idle(samples_needed);
        };

        let progress = match self.engine.progress(now) {
            Some(progress) => progress.elapsed_fraction,
            None if run.status().is_terminal() => 1.0,
            None => run.progress(),
        };
        let failure = match run.status() {
            CalibrationStatus::Failed { reason } => Some(reason.message()),
            _ => None,
        };

        CalibrationView {
            run_id: Some(run.id()),
            kind: Some(run.kind()),
            status: run.status().label(),
            samples_collected: run.sample_count(),
            samples_needed,
            progress,
            failure,
        }
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
