//! Socket traits

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// A single WebSocket message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketMessage {
    /// Text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
}

/// An open, message-oriented socket
#[async_trait]
pub trait Socket: Send {
    /// Send one message
    async fn send(&mut self, message: SocketMessage) -> Result<(), TransportError>;

    /// Receive the next message
    ///
    /// Returns `None` once the peer has closed the socket. Must be
    /// cancel-safe: it is polled inside `tokio::select!`.
    async fn recv(&mut self) -> Option<Result<SocketMessage, TransportError>>;

    /// Close the socket; errors are ignored
    async fn close(&mut self);
}

/// Opens sockets
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `url`
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError>;
}
