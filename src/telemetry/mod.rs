//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes live-stream, calibration, delivery, and sensor
//! events into a bounded history plus async broadcast stream. The driver owns
//! one hub and shares it with the debug server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::calibration::CalibrationOutcome;
use crate::error::{ErrorCode, SensorError, TransportError};
use crate::transport::{LiveFix, MessageKind};

pub mod events;

pub use events::MetricEvent;

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut history) = self.history.lock() {
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window of gaps between forwarded live fixes.
struct IntervalTracker {
    samples: VecDeque<f64>,
    max_samples: usize,
}

impl IntervalTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Returns (avg, max, min, count) over the window.
    fn observe(&mut self, value_ms: f64) -> (f64, f64, f64, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value_ms.abs());

        let count = self.samples.len();
        let sum: f64 = self.samples.iter().copied().sum();
        let max = self.samples.iter().copied().fold(0.0_f64, f64::max);
        let min = self
            .samples
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let avg = if count == 0 { 0.0 } else { sum / count as f64 };
        (avg, max, min, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    intervals: Mutex<IntervalTracker>,
    last_live_at: Mutex<Option<DateTime<Utc>>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, interval_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            intervals: Mutex::new(IntervalTracker::new(interval_window)),
            last_live_at: Mutex::new(None),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.collector.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    /// Record a live fix handed to the transport at `at`.
    pub fn record_live_forwarded(&self, fix: &LiveFix, at: DateTime<Utc>) {
        self.collector.publish(MetricEvent::LiveForwarded {
            lat: fix.lat,
            lon: fix.lon,
            acc: fix.acc,
        });

        let previous = match self.last_live_at.lock() {
            Ok(mut last) => last.replace(at),
            Err(_) => None,
        };
        let Some(previous) = previous else {
            return;
        };

        let gap_ms = (at - previous).num_milliseconds() as f64;
        let stats = self
            .intervals
            .lock()
            .map(|mut tracker| tracker.observe(gap_ms))
            .ok();
        if let Some((avg_ms, max_ms, min_ms, sample_count)) = stats {
            self.collector.publish(MetricEvent::LiveInterval {
                avg_ms,
                max_ms,
                min_ms,
                sample_count,
            });
        }
    }

    pub fn record_calibration_started(&self, run_id: u64, deadline: DateTime<Utc>) {
        self.collector.publish(MetricEvent::CalibrationStarted {
            run_id,
            deadline_ms: deadline.timestamp_millis(),
        });
    }

    pub fn record_calibration_finished(&self, outcome: &CalibrationOutcome) {
        let event = match outcome {
            CalibrationOutcome::Completed {
                run_id,
                kind,
                result,
            } => MetricEvent::CalibrationFinished {
                run_id: run_id.0,
                kind: *kind,
                completed: true,
                sample_count: Some(result.sample_count),
                detail: None,
            },
            CalibrationOutcome::Failed {
                run_id,
                kind,
                reason,
            } => MetricEvent::CalibrationFinished {
                run_id: run_id.0,
                kind: *kind,
                completed: false,
                sample_count: None,
                detail: Some(reason.message()),
            },
        };
        self.collector.publish(event);
    }

    pub fn record_delivery_failure(&self, kind: MessageKind, err: &TransportError) {
        self.collector.publish(MetricEvent::DeliveryFailed {
            kind,
            code: err.code(),
            message: err.message(),
        });
    }

    pub fn record_sensor_fault(&self, err: &SensorError) {
        self.collector.publish(MetricEvent::SensorFault {
            code: err.code(),
            message: err.message(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}
