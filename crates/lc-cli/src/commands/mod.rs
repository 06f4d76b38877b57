//! CLI command implementations

mod config;
mod console;
mod watch;

pub use config::{config_init, config_path, config_show};
pub use console::{console_command, key_action, key_to_bytes, KeyAction, StdoutTerminal, StdoutTerminalFactory};
pub use watch::{watch_command, WatchOptions};
