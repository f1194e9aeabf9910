use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};

use crate::managers::BroadcastChannelManager;

use super::routes::HttpServerError;

pub type SnapshotStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream of session snapshots.
///
/// Every snapshot is complete, so a lagging client only loses intermediate states.
pub fn snapshots(broadcasts: &BroadcastChannelManager) -> Result<SnapshotStream, HttpServerError> {
    let snapshots = broadcasts
        .snapshot_stream()
        .ok_or(HttpServerError::ServiceUnavailable(
            "snapshot channel not initialized",
        ))?;

    let stream = snapshots.filter_map(|snapshot| async move {
        match serde_json::to_string(&snapshot) {
            Ok(payload) => Some(Ok(Event::default().event("snapshot").data(payload))),
            Err(_) => None,
        }
    });

    Ok(Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    ))
}
