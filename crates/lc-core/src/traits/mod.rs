//! Collaborator traits
//!
//! The runtime never talks to a socket library or a terminal emulator
//! directly. It is handed implementations of these traits, which keeps the
//! transports testable against in-memory doubles.

mod socket;
mod terminal;

pub use socket::{Connector, Socket, SocketMessage};
pub use terminal::{InputHandler, TerminalFactory, TerminalWidget};
