//! WebSocket connector backed by tokio-tungstenite

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use lc_core::traits::{Connector, Socket, SocketMessage};
use lc_core::TransportError;

/// Default time allowed for the TCP, TLS and upgrade handshakes
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens real WebSocket connections
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Connector with a custom handshake timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError> {
        let connect_failed = |reason: String| TransportError::ConnectFailed {
            url: redact_token(url),
            reason,
        };

        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| connect_failed(format!("timed out after {:?}", self.connect_timeout)))?
            .map_err(|e| connect_failed(e.to_string()))?;

        Ok(Box::new(WsSocket { stream }))
    }
}

/// An open tungstenite stream
struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Socket for WsSocket {
    async fn send(&mut self, message: SocketMessage) -> Result<(), TransportError> {
        let message = match message {
            SocketMessage::Text(text) => Message::Text(text),
            SocketMessage::Binary(data) => Message::Binary(data.to_vec()),
        };
        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<SocketMessage, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(SocketMessage::Text(text))),
                Ok(Message::Binary(data)) => {
                    return Some(Ok(SocketMessage::Binary(Bytes::from(data))))
                }
                // tungstenite answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(frame)) => {
                    tracing::debug!("WebSocket closed by peer: {:?}", frame);
                    return None;
                }
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::trace!("Error closing WebSocket: {}", e);
        }
    }
}

/// Strip the query string so tokens never reach the logs
fn redact_token(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?…", base),
        None => url.to_string(),
    }
}
