//! In-memory doubles for the runtime integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use lc_core::traits::{
    Connector, InputHandler, Socket, SocketMessage, TerminalFactory, TerminalWidget,
};
use lc_core::{StaticCredentials, TransportError};
use lc_protocol::{LabId, NodeId, Origin};
use lc_runtime::ConnectionContext;

/// Let spawned tasks run without moving the paused clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Move the paused clock forward and let tasks react
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

/// Context pointing at `https://lab.example`
pub fn context(connector: &Arc<MockConnector>, token: Option<&str>) -> ConnectionContext {
    let origin = Origin::parse("https://lab.example").expect("valid origin");
    ConnectionContext::new(
        origin,
        Arc::new(StaticCredentials::new(token.map(str::to_string))),
        Arc::clone(connector) as Arc<dyn Connector>,
    )
}

/// Server side of one accepted mock socket
#[derive(Default)]
pub struct MockPeer {
    to_client: Mutex<Option<mpsc::UnboundedSender<SocketMessage>>>,
    sent: Mutex<Vec<SocketMessage>>,
    client_closed: AtomicBool,
}

impl MockPeer {
    /// Push a text frame to the client
    pub fn push_text(&self, text: &str) {
        self.push(SocketMessage::Text(text.to_string()));
    }

    /// Push a binary frame to the client
    pub fn push_binary(&self, data: &[u8]) {
        self.push(SocketMessage::Binary(Bytes::copy_from_slice(data)));
    }

    fn push(&self, message: SocketMessage) {
        if let Some(tx) = self.to_client.lock().unwrap().as_ref() {
            let _ = tx.send(message);
        }
    }

    /// Drop the connection from the server side
    pub fn close(&self) {
        self.to_client.lock().unwrap().take();
    }

    /// Frames the client sent
    pub fn sent(&self) -> Vec<SocketMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Text frames the client sent
    pub fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|message| match message {
                SocketMessage::Text(text) => Some(text),
                SocketMessage::Binary(_) => None,
            })
            .collect()
    }

    /// Whether the client closed the socket
    pub fn client_closed(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }
}

struct MockSocket {
    incoming: mpsc::UnboundedReceiver<SocketMessage>,
    peer: Arc<MockPeer>,
}

#[async_trait]
impl Socket for MockSocket {
    async fn send(&mut self, message: SocketMessage) -> Result<(), TransportError> {
        if self.peer.to_client.lock().unwrap().is_none() {
            return Err(TransportError::Closed("peer gone".to_string()));
        }
        self.peer.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<SocketMessage, TransportError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.peer.client_closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ConnectorState {
    urls: Vec<String>,
    peers: Vec<Arc<MockPeer>>,
    refuse: u32,
}

/// Connector handing out in-memory sockets
#[derive(Default)]
pub struct MockConnector {
    state: Mutex<ConnectorState>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse the next `n` connection attempts
    pub fn refuse_next(&self, n: u32) {
        self.state.lock().unwrap().refuse = n;
    }

    /// Refuse every attempt until [`accept`](Self::accept) is called
    pub fn refuse_all(&self) {
        self.refuse_next(u32::MAX);
    }

    /// Accept attempts again
    pub fn accept(&self) {
        self.refuse_next(0);
    }

    /// Number of connection attempts, refused ones included
    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().urls.len()
    }

    /// URLs of every attempt in order
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }

    /// Number of sockets actually opened
    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().peers.len()
    }

    /// Server side of the `index`th opened socket
    pub fn peer(&self, index: usize) -> Arc<MockPeer> {
        Arc::clone(&self.state.lock().unwrap().peers[index])
    }

    /// Server side of the most recently opened socket
    pub fn last_peer(&self) -> Arc<MockPeer> {
        let state = self.state.lock().unwrap();
        Arc::clone(state.peers.last().expect("no socket opened"))
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.urls.push(url.to_string());

        if state.refuse > 0 {
            state.refuse = state.refuse.saturating_sub(1);
            return Err(TransportError::ConnectFailed {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(MockPeer {
            to_client: Mutex::new(Some(tx)),
            ..Default::default()
        });
        state.peers.push(Arc::clone(&peer));

        Ok(Box::new(MockSocket { incoming: rx, peer }))
    }
}

/// Terminal widget that records everything it is asked to do
#[derive(Default)]
pub struct RecordingTerminal {
    output: Mutex<Vec<u8>>,
    handler: Mutex<Option<InputHandler>>,
    focused: AtomicUsize,
    fitted: AtomicUsize,
    disposed: AtomicBool,
    writes_after_dispose: AtomicUsize,
}

impl RecordingTerminal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything written so far, lossily decoded
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }

    /// Simulate the operator typing
    pub fn type_keys(&self, keys: &str) {
        if let Some(handler) = self.handler.lock().unwrap().as_ref() {
            handler(Bytes::copy_from_slice(keys.as_bytes()));
        }
    }

    pub fn focus_count(&self) -> usize {
        self.focused.load(Ordering::SeqCst)
    }

    pub fn fit_count(&self) -> usize {
        self.fitted.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn writes_after_dispose(&self) -> usize {
        self.writes_after_dispose.load(Ordering::SeqCst)
    }
}

impl TerminalWidget for RecordingTerminal {
    fn write(&self, data: &[u8]) {
        if self.is_disposed() {
            self.writes_after_dispose.fetch_add(1, Ordering::SeqCst);
        }
        self.output.lock().unwrap().extend_from_slice(data);
    }

    fn on_data(&self, handler: InputHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn focus(&self) {
        self.focused.fetch_add(1, Ordering::SeqCst);
    }

    fn fit(&self) {
        self.fitted.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.handler.lock().unwrap().take();
    }
}

/// Factory remembering every terminal it created
#[derive(Default)]
pub struct RecordingFactory {
    created: Mutex<Vec<(LabId, NodeId, Arc<RecordingTerminal>)>>,
}

impl RecordingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Terminal number `index` in creation order
    pub fn terminal(&self, index: usize) -> Arc<RecordingTerminal> {
        Arc::clone(&self.created.lock().unwrap()[index].2)
    }

    /// Number of terminals created
    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Identity terminal number `index` was created for
    pub fn identity(&self, index: usize) -> (LabId, NodeId) {
        let created = self.created.lock().unwrap();
        (created[index].0.clone(), created[index].1.clone())
    }
}

impl TerminalFactory for RecordingFactory {
    fn create(&self, lab: &LabId, node: &NodeId) -> Arc<dyn TerminalWidget> {
        let terminal = RecordingTerminal::new();
        self.created
            .lock()
            .unwrap()
            .push((lab.clone(), node.clone(), Arc::clone(&terminal)));
        terminal
    }
}
