//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use lc_protocol::{Origin, ProtocolError};

use super::serde_utils::duration_secs;
use crate::reconnect::ReconnectPolicy;

/// Configuration for the lab console client runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin the console is served from, e.g. `https://lab.example.com`.
    ///
    /// Socket URLs are derived from it: `https` selects `wss`, `http`
    /// selects `ws`.
    pub origin: String,

    /// File holding the bearer token, read on every connect
    pub token_path: PathBuf,

    /// Backoff for console sockets
    pub console: ReconnectPolicy,

    /// Backoff for the state-sync socket
    pub state_sync: ReconnectPolicy,

    /// Interval between keepalive pings on the state-sync socket
    #[serde(with = "duration_secs")]
    pub ping_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            token_path: super::default_config_dir().join("token"),
            console: ReconnectPolicy::CONSOLE,
            state_sync: ReconnectPolicy::STATE_SYNC,
            ping_interval: Duration::from_secs(25),
        }
    }
}

impl ClientConfig {
    /// Parse the configured origin
    pub fn parsed_origin(&self) -> Result<Origin, ProtocolError> {
        Origin::parse(&self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.console, ReconnectPolicy::CONSOLE);
        assert_eq!(config.state_sync, ReconnectPolicy::STATE_SYNC);
        assert_eq!(config.ping_interval, Duration::from_secs(25));
        assert!(!config.parsed_origin().unwrap().is_secure());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            origin = "https://lab.example.com"

            [console]
            base = 500
            cap = 4000
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert!(config.parsed_origin().unwrap().is_secure());
        assert_eq!(config.console.base, Duration::from_millis(500));
        assert_eq!(config.console.max_attempts, Some(3));
        assert_eq!(config.state_sync, ReconnectPolicy::STATE_SYNC);
    }
}
