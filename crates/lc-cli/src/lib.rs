//! lc-cli: Command-line front end for the lab console runtime
//!
//! Provides the `lab-console` binary: attach to a device console, follow a
//! lab's state stream, and manage the client configuration.

pub mod commands;
pub mod output;
pub mod settings;
