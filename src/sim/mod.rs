//! Simulated positioning sensor for desktop runs and tests.
//!
//! Fixes are scattered around a centre with bounded jitter, random accuracy
//! and a configurable share of invalid or stale fixes. All randomness comes
//! from a seeded `StdRng`, so a `SimulationSpec` plus a clock replays
//! identically.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::SensorError;
use crate::location::{Coordinate, PositionSample};
use crate::runtime::{Clock, EventSink, SensorSource};
use crate::session::{AuthorizationStatus, SessionEvent};

/// Meters per degree of latitude
const METERS_PER_DEGREE: f64 = 111_320.0;

/// How far a stale fix is pushed into the past
const STALE_OFFSET_S: i64 = 10;

/// Declarative description of a simulated fix stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSpec {
    pub center: Coordinate,
    /// Largest offset from the centre along each axis, in meters
    #[serde(default = "default_jitter_m")]
    pub jitter_m: f64,
    #[serde(default = "default_min_accuracy_m")]
    pub min_accuracy_m: f64,
    #[serde(default = "default_max_accuracy_m")]
    pub max_accuracy_m: f64,
    /// Probability that a fix reports accuracy -1 (invalid)
    #[serde(default = "default_fault_probability")]
    pub invalid_probability: f64,
    /// Probability that a fix carries a timestamp well in the past
    #[serde(default = "default_fault_probability")]
    pub stale_probability: f64,
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,
    #[serde(default)]
    pub seed: u64,
}

fn default_jitter_m() -> f64 {
    3.0
}

fn default_min_accuracy_m() -> f64 {
    2.0
}

fn default_max_accuracy_m() -> f64 {
    12.0
}

fn default_fault_probability() -> f64 {
    0.02
}

fn default_rate_hz() -> f64 {
    5.0
}

impl SimulationSpec {
    pub fn around(center: Coordinate) -> Self {
        Self {
            center,
            jitter_m: default_jitter_m(),
            min_accuracy_m: default_min_accuracy_m(),
            max_accuracy_m: default_max_accuracy_m(),
            invalid_probability: default_fault_probability(),
            stale_probability: default_fault_probability(),
            rate_hz: default_rate_hz(),
            seed: 0,
        }
    }

    /// Time between two fixes
    pub fn period(&self) -> StdDuration {
        if self.rate_hz > 0.0 && self.rate_hz.is_finite() {
            StdDuration::from_secs_f64(1.0 / self.rate_hz).max(StdDuration::from_millis(1))
        } else {
            StdDuration::from_secs(1)
        }
    }
}

/// Deterministic fix generator.
pub struct SampleGenerator {
    spec: SimulationSpec,
    rng: StdRng,
}

impl SampleGenerator {
    pub fn new(spec: SimulationSpec) -> Self {
        let rng = StdRng::seed_from_u64(spec.seed);
        Self { spec, rng }
    }

    pub fn spec(&self) -> &SimulationSpec {
        &self.spec
    }

    /// Next fix as observed at `now`
    pub fn sample_at(&mut self, now: DateTime<Utc>) -> PositionSample {
        let jitter = self.spec.jitter_m.abs();
        let north_m = self.rng.gen_range(-jitter..=jitter);
        let east_m = self.rng.gen_range(-jitter..=jitter);

        let latitude = self.spec.center.latitude + north_m / METERS_PER_DEGREE;
        let lon_scale = METERS_PER_DEGREE * self.spec.center.latitude.to_radians().cos();
        let longitude = if lon_scale.abs() > f64::EPSILON {
            self.spec.center.longitude + east_m / lon_scale
        } else {
            self.spec.center.longitude
        };

        let low = self.spec.min_accuracy_m.min(self.spec.max_accuracy_m);
        let high = self.spec.min_accuracy_m.max(self.spec.max_accuracy_m);
        let mut accuracy_m = self.rng.gen_range(low..=high);
        if self
            .rng
            .gen_bool(self.spec.invalid_probability.clamp(0.0, 1.0))
        {
            accuracy_m = -1.0;
        }

        let mut timestamp = now;
        if self
            .rng
            .gen_bool(self.spec.stale_probability.clamp(0.0, 1.0))
        {
            timestamp = now - Duration::seconds(STALE_OFFSET_S);
        }

        PositionSample::new(latitude, longitude, accuracy_m, timestamp)
    }
}

/// Sensor that pushes generated fixes at `rate_hz` from a tokio task.
pub struct SimulatedSensor {
    generator: Arc<Mutex<SampleGenerator>>,
    clock: Arc<dyn Clock>,
    authorization: AuthorizationStatus,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedSensor {
    pub fn new(spec: SimulationSpec, clock: Arc<dyn Clock>) -> Self {
        Self {
            generator: Arc::new(Mutex::new(SampleGenerator::new(spec))),
            clock,
            authorization: AuthorizationStatus::Authorized,
            task: Mutex::new(None),
        }
    }

    /// Report a different authorization status (to exercise the prompt path)
    pub fn with_authorization(mut self, status: AuthorizationStatus) -> Self {
        self.authorization = status;
        self
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }
}

impl SensorSource for SimulatedSensor {
    fn authorization(&self) -> AuthorizationStatus {
        self.authorization
    }

    fn request_authorization(&self, sink: EventSink) {
        // the simulated user always agrees
        sink.push(SessionEvent::AuthorizationChanged(
            AuthorizationStatus::Authorized,
        ));
    }

    fn start_updates(&self, sink: EventSink) -> Result<(), SensorError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|err| SensorError::Unavailable {
                reason: format!("no async runtime: {}", err),
            })?;

        let period = self
            .generator
            .lock()
            .map(|generator| generator.spec().period())
            .map_err(|_| SensorError::Failed {
                reason: "generator lock poisoned".to_string(),
            })?;
        let generator = Arc::clone(&self.generator);
        let clock = Arc::clone(&self.clock);

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let sample = match generator.lock() {
                    Ok(mut generator) => generator.sample_at(clock.now()),
                    Err(_) => break,
                };
                if !sink.push(SessionEvent::Sample(sample)) {
                    break;
                }
            }
            log::debug!("[SimulatedSensor] Update task finished");
        });

        let mut task = self.task.lock().map_err(|_| SensorError::Failed {
            reason: "task lock poisoned".to_string(),
        })?;
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
        log::info!(
            "[SimulatedSensor] Streaming fixes every {} ms",
            period.as_millis()
        );
        Ok(())
    }

    fn stop_updates(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                log::info!("[SimulatedSensor] Stopped");
            }
        }
    }
}
