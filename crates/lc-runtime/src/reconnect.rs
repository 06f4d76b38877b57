//! Reconnect state machine
//!
//! Wraps the pure [`ReconnectPolicy`] delay function with the attempt
//! counter and phase a transport carries between sockets.

use std::time::Duration;

use lc_core::{ConnectionPhase, ConnectionStatus, ReconnectPolicy};

/// Attempt counter and phase of one reconnecting transport
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempt: u32,
    phase: ConnectionPhase,
}

impl ReconnectState {
    /// Fresh state: attempt 0, connecting
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            phase: ConnectionPhase::Connecting,
        }
    }

    /// A socket is being opened; the counter is left alone
    pub fn on_connecting(&mut self) {
        self.phase = ConnectionPhase::Connecting;
    }

    /// A socket opened successfully
    ///
    /// This is the only transition besides [`reset`](Self::reset) that
    /// clears the counter.
    pub fn on_open(&mut self) {
        self.attempt = 0;
        self.phase = ConnectionPhase::Connected;
    }

    /// The socket dropped; get the delay before the next attempt
    ///
    /// Returns `None` and moves to [`ConnectionPhase::Failed`] once the
    /// policy's ceiling is reached.
    pub fn schedule(&mut self) -> Option<Duration> {
        if !self.policy.allows(self.attempt) {
            self.phase = ConnectionPhase::Failed;
            return None;
        }

        let delay = self.policy.delay(self.attempt);
        self.attempt += 1;
        self.phase = ConnectionPhase::Disconnected;
        Some(delay)
    }

    /// Start over from attempt 0 (manual retry or identity change)
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.phase = ConnectionPhase::Connecting;
    }

    /// Reconnects scheduled since the last successful open
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Current phase
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Snapshot for publishing to the UI
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            phase: self.phase,
            attempt: self.attempt,
            max_attempts: self.policy.max_attempts,
        }
    }
}
