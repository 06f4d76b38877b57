//! lc-core: Core abstractions and configuration for the lab console runtime
//!
//! This crate provides the shared types, the reconnect policy, the
//! collaborator traits (sockets, terminal widget, credentials) and the
//! configuration structures used by the runtime, the window manager and
//! the CLI.

pub mod config;
pub mod credentials;
pub mod error;
pub mod reconnect;
pub mod time;
pub mod traits;
pub mod types;

pub use credentials::{CredentialStore, FileCredentials, StaticCredentials};
pub use error::{ConfigError, LcError, TransportError};
pub use reconnect::ReconnectPolicy;
pub use types::{ConnectionPhase, ConnectionStatus};
