// SessionDriver - async host of a Session
//
// Owns the session and every collaborator handle. Sensor callbacks, deadline
// timers and UI commands all arrive through one unbounded mpsc queue and are
// handled one at a time. Actions are executed immediately; transport results
// are fed back into the session before the next queued event.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::calibration::RunId;
use crate::config::AppConfig;
use crate::error::{log_sensor_error, ErrorCode, SensorError, TransportError};
use crate::managers::BroadcastChannelManager;
use crate::session::{Session, SessionAction, SessionEvent, SessionSnapshot};
use crate::telemetry::TelemetryHub;
use crate::transport::{OutboundMessage, Transport};

use super::clock::Clock;
use super::collaborators::{DriverMessage, EventSink, SensorSource, SessionKeepAlive};

/// Default period of the `Tick` poll in `run`
pub const DEFAULT_TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Platform services handed to the driver
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub sensor: Arc<dyn SensorSource>,
    pub keepalive: Arc<dyn SessionKeepAlive>,
    pub clock: Arc<dyn Clock>,
}

/// Async host of a [`Session`]
pub struct SessionDriver {
    session: Session,
    transport: Arc<dyn Transport>,
    sensor: Arc<dyn SensorSource>,
    keepalive: Arc<dyn SessionKeepAlive>,
    clock: Arc<dyn Clock>,
    tx: mpsc::UnboundedSender<DriverMessage>,
    rx: mpsc::UnboundedReceiver<DriverMessage>,
    deadlines: HashMap<RunId, JoinHandle<()>>,
    broadcasts: BroadcastChannelManager,
    telemetry: Arc<TelemetryHub>,
    last_reachable: bool,
    tick_interval: StdDuration,
}

impl SessionDriver {
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let broadcasts = BroadcastChannelManager::new();
        broadcasts.init_snapshots();
        broadcasts.init_outcomes();

        let last_reachable = collaborators.transport.is_reachable();
        let initial_authorization = collaborators.sensor.authorization();

        let mut driver = Self {
            session: Session::new(config),
            transport: collaborators.transport,
            sensor: collaborators.sensor,
            keepalive: collaborators.keepalive,
            clock: collaborators.clock,
            tx,
            rx,
            deadlines: HashMap::new(),
            broadcasts,
            telemetry: Arc::new(TelemetryHub::default()),
            last_reachable,
            tick_interval: DEFAULT_TICK_INTERVAL,
        };

        driver.dispatch(SessionEvent::ReachabilityChanged(last_reachable));
        driver.dispatch(SessionEvent::AuthorizationChanged(initial_authorization));
        driver
    }

    /// Change the period of the deadline poll in `run`
    pub fn with_tick_interval(mut self, interval: StdDuration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Handle for collaborators and UI code to push events
    pub fn event_sink(&self) -> EventSink {
        EventSink::new(self.tx.clone())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot(self.clock.now())
    }

    /// Shared channels; clones observe the same snapshots and outcomes
    pub fn broadcasts(&self) -> BroadcastChannelManager {
        self.broadcasts.clone()
    }

    pub fn telemetry(&self) -> Arc<TelemetryHub> {
        Arc::clone(&self.telemetry)
    }

    /// Number of deadline timers currently armed
    pub fn armed_deadlines(&self) -> usize {
        self.deadlines.len()
    }

    /// Handle one event and everything it causes, synchronously
    pub fn dispatch(&mut self, event: SessionEvent) {
        let mut pending = VecDeque::from([event]);
        let mut now = self.clock.now();

        while let Some(event) = pending.pop_front() {
            now = self.clock.now();
            if let SessionEvent::SensorFailed { reason } = &event {
                self.telemetry.record_sensor_fault(&SensorError::Failed {
                    reason: reason.clone(),
                });
            }
            for action in self.session.handle(event, now) {
                self.execute(action, now, &mut pending);
            }
        }

        self.broadcasts.publish_snapshot(self.session.snapshot(now));
    }

    /// Drain the queue until `shutdown` or every sender is gone
    ///
    /// A `Tick` is dispatched every tick interval so an overdue run is
    /// completed even if its timer task was lost.
    pub async fn run(&mut self) {
        let span = tracing::info_span!("session_driver");
        async {
            log::info!("[Driver] Event loop started");
            let mut ticker = tokio::time::interval(self.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    message = self.rx.recv() => match message {
                        Some(DriverMessage::Event(event)) => self.dispatch(event),
                        Some(DriverMessage::Shutdown) | None => break,
                    },
                    _ = ticker.tick() => self.dispatch(SessionEvent::Tick),
                }
            }

            self.shutdown();
            log::info!("[Driver] Event loop stopped");
        }
        .instrument(span)
        .await
    }

    /// Stop acquisition and drop every armed timer
    fn shutdown(&mut self) {
        if self.session.is_acquiring() {
            self.dispatch(SessionEvent::StopAcquisition);
        }
        for (_, handle) in self.deadlines.drain() {
            handle.abort();
        }
    }

    fn execute(
        &mut self,
        action: SessionAction,
        now: DateTime<Utc>,
        pending: &mut VecDeque<SessionEvent>,
    ) {
        match action {
            SessionAction::Send(message) => self.deliver(message, now, pending),
            SessionAction::ArmDeadline { run_id, at } => {
                self.telemetry.record_calibration_started(run_id.0, at);
                self.arm_deadline(run_id, at, now);
            }
            SessionAction::DisarmDeadline { run_id } => self.disarm_deadline(run_id),
            SessionAction::RequestAuthorization => {
                log::info!("[Driver] Requesting location authorization");
                self.sensor.request_authorization(self.event_sink());
            }
            SessionAction::StartSensor => {
                if let Err(err) = self.sensor.start_updates(self.event_sink()) {
                    log_sensor_error(&err, "start_updates");
                    pending.push_back(SessionEvent::SensorFailed {
                        reason: err.message(),
                    });
                }
            }
            SessionAction::StopSensor => self.sensor.stop_updates(),
            SessionAction::StartKeepalive => self.keepalive.start(),
            SessionAction::StopKeepalive => self.keepalive.stop(),
            SessionAction::CalibrationFinished(outcome) => {
                // the deadline may have fired already; the task is gone either way
                self.deadlines.remove(&outcome.run_id());
                self.telemetry.record_calibration_finished(&outcome);
                self.broadcasts.publish_outcome(outcome);
            }
        }
    }

    /// Fire-and-forget send; the result goes back to the session
    fn deliver(
        &mut self,
        message: OutboundMessage,
        now: DateTime<Utc>,
        pending: &mut VecDeque<SessionEvent>,
    ) {
        let kind = message.kind();
        if let OutboundMessage::Locations(fixes) = &message {
            for fix in fixes {
                self.telemetry.record_live_forwarded(fix, now);
            }
        }

        let reachable = self.transport.is_reachable();
        if reachable != self.last_reachable {
            self.last_reachable = reachable;
            pending.push_back(SessionEvent::ReachabilityChanged(reachable));
        }

        let result = if reachable {
            self.transport.send(&message)
        } else {
            Err(TransportError::Unreachable)
        };

        match result {
            Ok(()) => pending.push_back(SessionEvent::DeliverySucceeded { kind }),
            Err(error) => {
                self.telemetry.record_delivery_failure(kind, &error);
                pending.push_back(SessionEvent::DeliveryFailed { kind, error });
            }
        }
    }

    fn arm_deadline(&mut self, run_id: RunId, at: DateTime<Utc>, now: DateTime<Utc>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!(
                "[Driver] No async runtime; deadline for run {} relies on Tick",
                run_id
            );
            return;
        };

        let delay = (at - now).to_std().unwrap_or(StdDuration::ZERO);
        let sink = self.event_sink();
        let span = tracing::debug_span!("calibration_deadline", run_id = run_id.0);
        let handle = runtime.spawn(
            async move {
                tokio::time::sleep(delay).await;
                log::debug!("[Driver] Deadline timer fired for run {}", run_id);
                sink.push(SessionEvent::DeadlineElapsed { run_id });
            }
            .instrument(span),
        );

        if let Some(previous) = self.deadlines.insert(run_id, handle) {
            previous.abort();
        }
    }

    fn disarm_deadline(&mut self, run_id: RunId) {
        if let Some(handle) = self.deadlines.remove(&run_id) {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
