//! Effective client settings: config file plus command-line overrides

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use lc_core::config::{self, ClientConfig};
use lc_core::{ConfigError, CredentialStore, FileCredentials, StaticCredentials};
use lc_runtime::{ConnectionContext, WsConnector};

/// Client configuration after applying `--origin` and `--token`
#[derive(Debug, Clone)]
pub struct Settings {
    /// Loaded (or default) configuration with overrides applied
    pub config: ClientConfig,
    /// Token given on the command line; wins over the token file
    token: Option<String>,
}

impl Settings {
    /// Load the configuration and apply overrides
    ///
    /// A missing file at the default location means defaults; a missing
    /// file that was named explicitly is an error.
    pub fn load(
        config_path: Option<&Path>,
        origin: Option<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config::default_config_path);

        let mut config = match config::load_config::<ClientConfig>(&path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) if config_path.is_none() => {
                tracing::debug!("No config at {:?}, using defaults", path);
                ClientConfig::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to load config: {:?}", path))
            }
        };

        if let Some(origin) = origin {
            config.origin = origin;
        }

        Ok(Self { config, token })
    }

    /// Path of the config file that would be used
    pub fn config_file(config_path: Option<&PathBuf>) -> PathBuf {
        config_path
            .cloned()
            .unwrap_or_else(config::default_config_path)
    }

    /// Token source for socket URLs
    pub fn credentials(&self) -> Arc<dyn CredentialStore> {
        match &self.token {
            Some(token) => Arc::new(StaticCredentials::new(Some(token.clone()))),
            None => Arc::new(FileCredentials::new(&self.config.token_path)),
        }
    }

    /// Connection dependencies backed by real WebSockets
    pub fn context(&self) -> Result<ConnectionContext> {
        let origin = self
            .config
            .parsed_origin()
            .with_context(|| format!("Invalid origin: {}", self.config.origin))?;

        Ok(ConnectionContext::new(
            origin,
            self.credentials(),
            Arc::new(WsConnector::default()),
        ))
    }
}
