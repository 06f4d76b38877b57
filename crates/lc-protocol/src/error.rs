//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire payloads
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload was not valid JSON, or did not match the expected shape
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope carried a `type` this client does not understand
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Event type requires a `data` object but none was sent
    #[error("Event '{0}' is missing its data payload")]
    MissingData(&'static str),

    /// Origin string could not be turned into a socket endpoint
    #[error("Invalid origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: &'static str },
}
