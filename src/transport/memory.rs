//! In-process transports: a recording double for tests and replay, and a
//! stdout sink for the CLI.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::payload::OutboundMessage;
use super::Transport;
use crate::error::TransportError;

/// Transport that keeps every delivered message in memory
///
/// Reachability and send failures can be toggled to exercise the error paths.
pub struct RecordingTransport {
    reachable: AtomicBool,
    fail_sends: AtomicBool,
    sent: Mutex<Vec<OutboundMessage>>,
    attempts: Mutex<Vec<OutboundMessage>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make every reachable send fail with `SendFailed`
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Messages that were delivered
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Every send call, delivered or not
    pub fn attempts(&self) -> Vec<OutboundMessage> {
        self.attempts
            .lock()
            .map(|attempts| attempts.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.clear();
        }
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for RecordingTransport {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(message.clone());
        }

        if !self.is_reachable() {
            return Err(TransportError::Unreachable);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                reason: "simulated send failure".to_string(),
            });
        }

        self.sent
            .lock()
            .map_err(|_| TransportError::SendFailed {
                reason: "recording lock poisoned".to_string(),
            })?
            .push(message.clone());
        Ok(())
    }
}

/// Writes each message as one JSON line on stdout
#[derive(Debug, Default)]
pub struct StdoutTransport;

impl Transport for StdoutTransport {
    fn is_reachable(&self) -> bool {
        true
    }

    fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let line = message.to_json().map_err(|err| TransportError::SendFailed {
            reason: err.to_string(),
        })?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        Ok(())
    }
}
