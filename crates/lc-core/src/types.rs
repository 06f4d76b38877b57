//! Connection status types shared by both transports

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a reconnecting transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// A socket is being opened
    Connecting,
    /// The socket is open
    Connected,
    /// The socket dropped; a reconnect is scheduled
    Disconnected,
    /// Retries are exhausted; only a manual retry leaves this phase
    Failed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
            ConnectionPhase::Disconnected => write!(f, "disconnected"),
            ConnectionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a transport's connection state, published to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Current phase
    pub phase: ConnectionPhase,
    /// Reconnect attempts scheduled since the last successful open
    pub attempt: u32,
    /// Attempt ceiling, `None` when retries are unbounded
    pub max_attempts: Option<u32>,
}

impl ConnectionStatus {
    /// Initial status of a transport that is opening its first socket
    pub fn connecting(max_attempts: Option<u32>) -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            attempt: 0,
            max_attempts,
        }
    }

    /// Status of a transport with no socket and no retry pending
    pub fn idle(max_attempts: Option<u32>) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            attempt: 0,
            max_attempts,
        }
    }

    /// Whether the socket is open
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    /// Text for the reconnect overlay, `None` while healthy
    ///
    /// Bounded policies render `attempt N/MAX`, unbounded ones `attempt N`.
    pub fn overlay_text(&self) -> Option<String> {
        match self.phase {
            ConnectionPhase::Connected => None,
            ConnectionPhase::Connecting | ConnectionPhase::Disconnected if self.attempt == 0 => {
                None
            }
            ConnectionPhase::Connecting | ConnectionPhase::Disconnected => {
                Some(match self.max_attempts {
                    Some(max) => format!("Reconnecting… attempt {}/{}", self.attempt, max),
                    None => format!("Reconnecting… attempt {}", self.attempt),
                })
            }
            ConnectionPhase::Failed => Some("Connection failed. Retry to reconnect.".to_string()),
        }
    }
}
