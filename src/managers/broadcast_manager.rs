// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::calibration::CalibrationOutcome;
use crate::session::SessionSnapshot;

/// Manages the driver's tokio broadcast channels
///
/// Single Responsibility: Broadcast channel lifecycle and subscription
///
/// This manager centralizes broadcast channel creation, storage, and
/// subscription handling. Clones share the same channels, so the driver can
/// publish while the debug server and CLI subscribe.
///
/// # Channel Types
/// - Snapshots: `SessionSnapshot` after every handled event, plus the latest
///   one for on-demand reads
/// - Calibration outcomes: one message per finished run
#[derive(Clone)]
pub struct BroadcastChannelManager {
    snapshots: Arc<Mutex<Option<broadcast::Sender<SessionSnapshot>>>>,
    latest_snapshot: Arc<Mutex<Option<SessionSnapshot>>>,
    outcomes: Arc<Mutex<Option<broadcast::Sender<CalibrationOutcome>>>>,
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(None)),
            latest_snapshot: Arc::new(Mutex::new(None)),
            outcomes: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // SNAPSHOT CHANNEL
    // ========================================================================

    /// Initialize snapshot broadcast channel
    ///
    /// # Notes
    /// - Buffer size: 64 messages (a live stream at 5 Hz plus calibration
    ///   events leaves several seconds of headroom)
    /// - Lagging subscribers skip to the newest snapshot
    pub fn init_snapshots(&self) -> broadcast::Sender<SessionSnapshot> {
        let (tx, _) = broadcast::channel(64);
        if let Ok(mut slot) = self.snapshots.lock() {
            *slot = Some(tx.clone());
        }
        tx
    }

    /// Subscribe to snapshots
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<SessionSnapshot>>` - Receiver or None if not initialized
    pub fn subscribe_snapshots(&self) -> Option<broadcast::Receiver<SessionSnapshot>> {
        self.snapshots
            .lock()
            .ok()?
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    /// Snapshots as a stream; snapshots missed by a lagging reader are skipped
    pub fn snapshot_stream(&self) -> Option<impl Stream<Item = SessionSnapshot> + Send + 'static> {
        let receiver = self.subscribe_snapshots()?;
        Some(BroadcastStream::new(receiver).filter_map(|result| async move { result.ok() }))
    }

    /// Store `snapshot` as the latest and broadcast it
    ///
    /// Having no subscribers is not an error.
    pub fn publish_snapshot(&self, snapshot: SessionSnapshot) {
        if let Ok(mut latest) = self.latest_snapshot.lock() {
            *latest = Some(snapshot.clone());
        }
        if let Ok(slot) = self.snapshots.lock() {
            if let Some(tx) = slot.as_ref() {
                let _ = tx.send(snapshot);
            }
        }
    }

    /// Most recently published snapshot
    pub fn latest_snapshot(&self) -> Option<SessionSnapshot> {
        self.latest_snapshot.lock().ok()?.clone()
    }

    // ========================================================================
    // CALIBRATION OUTCOME CHANNEL
    // ========================================================================

    /// Initialize calibration outcome broadcast channel
    ///
    /// # Notes
    /// - Buffer size: 16 messages (one per finished run)
    pub fn init_outcomes(&self) -> broadcast::Sender<CalibrationOutcome> {
        let (tx, _) = broadcast::channel(16);
        if let Ok(mut slot) = self.outcomes.lock() {
            *slot = Some(tx.clone());
        }
        tx
    }

    /// Subscribe to calibration outcomes
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<CalibrationOutcome>>` - Receiver or None if not initialized
    pub fn subscribe_outcomes(&self) -> Option<broadcast::Receiver<CalibrationOutcome>> {
        self.outcomes
            .lock()
            .ok()?
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    pub fn publish_outcome(&self, outcome: CalibrationOutcome) {
        if let Ok(slot) = self.outcomes.lock() {
            if let Some(tx) = slot.as_ref() {
                let _ = tx.send(outcome);
            }
        }
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationKind, RunId};
    use crate::config::AppConfig;
    use crate::error::CalibrationError;
    use crate::session::Session;
    use chrono::Utc;

    fn snapshot() -> SessionSnapshot {
        Session::new(AppConfig::default()).snapshot(Utc::now())
    }

    #[test]
    fn test_snapshot_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();

        // Initially no subscription possible
        assert!(manager.subscribe_snapshots().is_none());

        let _tx = manager.init_snapshots();
        assert!(manager.subscribe_snapshots().is_some());
    }

    #[test]
    fn test_snapshot_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        manager.init_snapshots();

        let mut rx1 = manager.subscribe_snapshots().unwrap();
        let mut rx2 = manager.subscribe_snapshots().unwrap();

        manager.publish_snapshot(snapshot());

        assert!(!rx1.try_recv().unwrap().acquiring);
        assert!(!rx2.try_recv().unwrap().acquiring);
    }

    #[test]
    fn test_latest_snapshot_without_channel() {
        let manager = BroadcastChannelManager::new();
        assert!(manager.latest_snapshot().is_none());

        // publishing before init only updates the latest value
        manager.publish_snapshot(snapshot());
        assert!(manager.latest_snapshot().is_some());
    }

    #[test]
    fn test_clones_share_channels() {
        let manager = BroadcastChannelManager::new();
        let clone = manager.clone();
        manager.init_outcomes();

        let mut rx = clone.subscribe_outcomes().unwrap();
        let outcome = CalibrationOutcome::Failed {
            run_id: RunId(3),
            kind: CalibrationKind::Rig,
            reason: CalibrationError::NoAverage,
        };
        manager.publish_outcome(outcome.clone());
        assert_eq!(rx.try_recv().unwrap(), outcome);
    }

    #[tokio::test]
    async fn test_snapshot_stream_yields_published_snapshots() {
        let manager = BroadcastChannelManager::new();
        assert!(manager.snapshot_stream().is_none());

        manager.init_snapshots();
        let stream = manager.snapshot_stream().unwrap();
        manager.publish_snapshot(snapshot());
        manager.publish_snapshot(snapshot());

        let received: Vec<SessionSnapshot> = stream.take(2).collect().await;
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn test_default_implementation() {
        let manager = BroadcastChannelManager::default();
        assert!(manager.subscribe_snapshots().is_none());
        assert!(manager.subscribe_outcomes().is_none());
    }
}
