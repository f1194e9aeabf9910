// Session module - events in, actions out
//
// `Session` owns the calibration engine, the live shaper and every piece of
// UI-facing state. It is pure: hosts feed `SessionEvent`s and execute the
// returned `SessionAction`s. `runtime::SessionDriver` is the async host;
// the replay CLI drives a session directly.

pub mod core;
pub mod events;
pub mod snapshot;

pub use self::core::Session;
pub use events::{AuthorizationStatus, SessionAction, SessionEvent};
pub use snapshot::{CalibrationView, RejectionCounts, SessionCounters, SessionSnapshot};
