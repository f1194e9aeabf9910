// Rig Telemetry Core - watch-side location telemetry
// Validates fixes, calibrates reference points and streams live positions
// to the companion device.

// Module declarations
pub mod calibration;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod http;
pub mod live;
pub mod location;
pub mod managers;
pub mod runtime;
pub mod session;
pub mod sim;
pub mod telemetry;
pub mod transport;

// Re-exports for convenience
pub use calibration::{CalibrationKind, CalibrationOutcome, CalibrationResult};
pub use config::AppConfig;
pub use location::{Coordinate, PositionSample};
pub use session::{Session, SessionAction, SessionEvent, SessionSnapshot};

/// Initialize Android logging
///
/// Routes `tracing` spans and `log` records to logcat. Safe to call more
/// than once; later calls are ignored.
#[cfg(target_os = "android")]
pub fn init_logging() {
    use tracing_subscriber::prelude::*;

    match tracing_android::layer("RigTelemetry") {
        Ok(layer) => {
            let _ = tracing_subscriber::registry()
                .with(layer)
                .with(tracing_subscriber::filter::LevelFilter::DEBUG)
                .try_init();
        }
        Err(err) => eprintln!("RigTelemetry: logcat layer unavailable: {}", err),
    }
}

/// Initialize desktop logging
///
/// Logs go to stderr so stdout stays free for payload lines. The level comes
/// from `RUST_LOG` (`error`, `warn`, `info`, `debug`, `trace`), default `info`.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO);

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("[Tests] logging initialized twice");
    }
}
