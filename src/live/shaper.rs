// LiveTelemetryShaper - rate-limited forwarding of live fixes
//
// Every fix goes through the live gate, then the rate gate. Fixes that fail
// either gate are dropped; nothing is queued. The only state is the time of
// the last forward decision.

use chrono::{DateTime, Duration, Utc};

use crate::config::LiveConfig;
use crate::location::{PositionSample, Rejection, SampleValidator, ValidationThresholds};
use crate::transport::LiveFix;

/// What the shaper decided for one fix
#[derive(Debug, Clone, PartialEq)]
pub enum LiveDecision {
    /// Send this fix now
    Forward {
        fix: LiveFix,
        /// Time since the previous forward, `None` for the first one
        since_last: Option<Duration>,
    },
    /// Fix failed the live gate
    Rejected(Rejection),
    /// Fix arrived before `min_send_interval` elapsed
    Throttled,
}

/// Live fix shaper
///
/// Forwards at most one fix per `min_send_interval`. The slot is consumed on
/// the forward decision itself, so a send that later fails still counts.
pub struct LiveTelemetryShaper {
    thresholds: ValidationThresholds,
    min_send_interval: Duration,
    last_sent_at: Option<DateTime<Utc>>,
}

impl LiveTelemetryShaper {
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            min_send_interval: config.min_send_interval(),
            last_sent_at: None,
        }
    }

    /// Time of the last forward decision
    pub fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_sent_at
    }

    pub fn min_send_interval(&self) -> Duration {
        self.min_send_interval
    }

    /// Decide what to do with one fix
    pub fn offer(&mut self, sample: &PositionSample, now: DateTime<Utc>) -> LiveDecision {
        if let Err(rejection) = SampleValidator::validate(sample, now, &self.thresholds) {
            log::debug!("[LiveShaper] Dropped fix: {}", rejection.describe());
            return LiveDecision::Rejected(rejection);
        }

        let since_last = self.last_sent_at.map(|last| now - last);
        if let Some(gap) = since_last {
            if gap < self.min_send_interval {
                return LiveDecision::Throttled;
            }
        }

        self.last_sent_at = Some(now);
        LiveDecision::Forward {
            fix: LiveFix::from(sample),
            since_last,
        }
    }

    /// Forget the last forward so the next valid fix passes immediately
    pub fn reset(&mut self) {
        self.last_sent_at = None;
    }
}
