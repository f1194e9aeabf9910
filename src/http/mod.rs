//! Debug HTTP server surfaced only in debug feature builds.
//!
//! This module spawns a lightweight Axum server that exposes health, the
//! latest session snapshot, telemetry metrics, and an SSE snapshot stream
//! for diagnostics while the watch build is tethered.

#[cfg(all(feature = "debug_http", debug_assertions))]
mod routes;
#[cfg(all(feature = "debug_http", debug_assertions))]
mod sse;

use std::sync::Arc;

use crate::managers::BroadcastChannelManager;
use crate::telemetry::TelemetryHub;

#[cfg(all(feature = "debug_http", debug_assertions))]
pub use routes::{build_router, run_http_server, DebugHttpState};

#[cfg(all(feature = "debug_http", debug_assertions))]
use log::{error, info, warn};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::net::SocketAddr;
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::thread;

#[cfg(all(feature = "debug_http", debug_assertions))]
static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Spawn the debug HTTP server only when the feature flag and debug builds are enabled.
pub fn spawn_if_enabled(broadcasts: BroadcastChannelManager, telemetry: Arc<TelemetryHub>) {
    #[cfg(all(feature = "debug_http", debug_assertions))]
    {
        if SERVER_STARTED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Debug HTTP server already running");
            return;
        }

        let addr: SocketAddr = std::env::var("RIG_DEBUG_HTTP_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787)));

        let token = std::env::var("RIG_DEBUG_TOKEN").unwrap_or_else(|_| "rig-debug".to_string());
        let preview = token.chars().take(4).collect::<String>();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("Failed to build tokio runtime for debug HTTP server: {}", err);
                    SERVER_STARTED.store(false, Ordering::SeqCst);
                    return;
                }
            };

            info!(
                "Debug HTTP server binding {} (token prefix {}***)",
                addr, preview
            );

            runtime.block_on(async move {
                let state = DebugHttpState::new(broadcasts, telemetry, token);
                if let Err(err) = run_http_server(state, addr).await {
                    error!("Debug HTTP server stopped: {}", err);
                }
            });
        });
    }

    #[cfg(not(all(feature = "debug_http", debug_assertions)))]
    {
        // Debug HTTP server disabled in this build.
        let _ = (broadcasts, telemetry);
    }
}
