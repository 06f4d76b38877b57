//! Console control frames
//!
//! The console socket is an unframed terminal stream. The orchestrator
//! multiplexes a small control channel onto it by sending text messages that
//! are JSON objects of the form:
//!
//! ```json
//! {"type": "console-control", "state": "read_only", "message": "Lab is locked"}
//! ```
//!
//! Every other payload is terminal output and is passed through untouched.
//!
//! # Ambiguity
//!
//! Classification is a best-effort parse plus a discriminator check. A
//! device that prints a line which happens to be exactly such an object
//! will have that line swallowed and the console mode flipped. Resolving
//! this needs a framing change on the wire (for example a reserved leading
//! byte), not a stricter guess on this side, so the behaviour is kept as is.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Value of the `type` field that marks a control frame
pub const CONTROL_FRAME_TYPE: &str = "console-control";

/// Interactivity mode requested by a control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleMode {
    /// Keystrokes are discarded locally
    ReadOnly,
    /// Keystrokes are forwarded to the device
    Interactive,
}

impl ConsoleMode {
    /// Whether keystrokes should be forwarded in this mode
    pub fn is_interactive(&self) -> bool {
        matches!(self, ConsoleMode::Interactive)
    }
}

/// Out-of-band control message carried on the console stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    /// Always [`CONTROL_FRAME_TYPE`]
    #[serde(rename = "type")]
    pub kind: String,
    /// Requested mode
    pub state: ConsoleMode,
    /// Human-readable reason, shown to the operator
    #[serde(default)]
    pub message: String,
}

impl ControlFrame {
    /// Build a control frame for the given mode
    pub fn new(state: ConsoleMode, message: impl Into<String>) -> Self {
        Self {
            kind: CONTROL_FRAME_TYPE.to_string(),
            state,
            message: message.into(),
        }
    }

    /// Try to interpret a text payload as a control frame
    ///
    /// Returns `None` for anything that is not a JSON object with the
    /// control discriminator and a recognised `state`.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return None;
        }

        let frame: ControlFrame = serde_json::from_str(trimmed).ok()?;
        if frame.kind != CONTROL_FRAME_TYPE {
            return None;
        }
        Some(frame)
    }
}

/// A classified inbound console payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInbound {
    /// Bytes to hand to the terminal verbatim
    Output(Bytes),
    /// Mode change, never shown in the terminal
    Control(ControlFrame),
}

impl ConsoleInbound {
    /// Classify a text message
    pub fn from_text(text: String) -> Self {
        match ControlFrame::parse(&text) {
            Some(frame) => {
                tracing::trace!(state = ?frame.state, "Console control frame");
                ConsoleInbound::Control(frame)
            }
            None => ConsoleInbound::Output(Bytes::from(text)),
        }
    }

    /// Classify a binary message
    ///
    /// Binary payloads are always terminal output.
    pub fn from_binary(data: impl Into<Bytes>) -> Self {
        ConsoleInbound::Output(data.into())
    }
}
