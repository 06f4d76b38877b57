//! Reconnect backoff policy
//!
//! `delay(attempt) = min(base * 2^attempt, cap)`. The console and the
//! state-sync transports share this function with different parameters:
//! consoles give up after a fixed number of attempts, state sync retries
//! forever.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::serde_utils::duration_millis;

/// Exponential backoff parameters for a reconnecting transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect
    #[serde(with = "duration_millis")]
    pub base: Duration,

    /// Upper bound for any single delay
    #[serde(with = "duration_millis")]
    pub cap: Duration,

    /// Number of reconnects scheduled before giving up, `None` for unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Console sockets: 1s doubling to 15s, at most 10 attempts
    pub const CONSOLE: ReconnectPolicy = ReconnectPolicy {
        base: Duration::from_millis(1_000),
        cap: Duration::from_millis(15_000),
        max_attempts: Some(10),
    };

    /// State-sync sockets: 1s doubling to 30s, retried indefinitely
    pub const STATE_SYNC: ReconnectPolicy = ReconnectPolicy {
        base: Duration::from_millis(1_000),
        cap: Duration::from_millis(30_000),
        max_attempts: None,
    };

    /// Create a policy with custom parameters
    pub fn new(base: Duration, cap: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    /// Delay before reconnect number `attempt` (0-based)
    ///
    /// Saturates instead of overflowing for large attempt numbers.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u128.checked_shl(attempt).unwrap_or(u128::MAX);
        let millis = self
            .base
            .as_millis()
            .saturating_mul(factor)
            .min(self.cap.as_millis());
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Whether another reconnect may be scheduled after `attempt` have run
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}
