//! Core error types for the lab console runtime

use lc_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the lab console crates
#[derive(Error, Debug)]
pub enum LcError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Socket-level errors
///
/// These never escape a transport: they are logged and turned into a
/// phase change followed by a scheduled reconnect.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The socket could not be opened
    #[error("Connect to {url} failed: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// The socket was closed by the peer or the network
    #[error("Connection closed: {0}")]
    Closed(String),

    /// A frame could not be written
    #[error("Send failed: {0}")]
    Send(String),

    /// A frame could not be read
    #[error("Receive failed: {0}")]
    Receive(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
