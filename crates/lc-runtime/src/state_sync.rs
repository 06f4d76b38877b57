//! State-sync transport
//!
//! One socket per lab carrying typed envelopes. Node, link and lab events
//! are upserted into the [`StateStore`] and then handed to the registered
//! listener; job progress only reaches its listener. A `ping` goes out every
//! [`DEFAULT_PING_INTERVAL`] while connected.
//!
//! Losing the socket is recoverable and silent: reconnects follow the
//! unbounded [`ReconnectPolicy::STATE_SYNC`] schedule.
//!
//! Switching labs clears the store, resets the attempt counter and only then
//! opens the new socket, so no reader ever sees state from the old lab next
//! to state from the new one.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use lc_core::time::current_timestamp;
use lc_core::traits::{Socket, SocketMessage};
use lc_core::{ConnectionStatus, ReconnectPolicy};
use lc_protocol::{
    state_sync_url, ClientFrame, JobProgress, LabId, LabState, LinkStateEntry, NodeStateEntry,
    StateEvent,
};

use crate::context::ConnectionContext;
use crate::reconnect::ReconnectState;
use crate::store::StateStore;

/// Interval between keepalive pings
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Mutable callback slots
///
/// The socket task looks up the current listener for every event, so a
/// listener registered later takes effect without reconnecting.
#[derive(Default)]
struct Listeners {
    node: RwLock<Option<Listener<NodeStateEntry>>>,
    link: RwLock<Option<Listener<LinkStateEntry>>>,
    lab: RwLock<Option<Listener<LabState>>>,
    job: RwLock<Option<Listener<JobProgress>>>,
}

fn load<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>) -> Option<Arc<T>> {
    match slot.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn store_listener<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, listener: Arc<T>) {
    match slot.write() {
        Ok(mut guard) => *guard = Some(listener),
        Err(poisoned) => *poisoned.into_inner() = Some(listener),
    }
}

#[derive(Debug)]
enum SyncCommand {
    Refresh,
}

struct SyncSession {
    lab: LabId,
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<SyncCommand>,
    task: JoinHandle<()>,
}

/// Subscription to one lab's state stream
pub struct StateSyncTransport {
    ctx: ConnectionContext,
    policy: ReconnectPolicy,
    ping_interval: Duration,
    store: Arc<StateStore>,
    listeners: Arc<Listeners>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    session: Option<SyncSession>,
}

impl StateSyncTransport {
    /// Create an idle transport; call [`set_lab`](Self::set_lab) to connect
    pub fn new(ctx: ConnectionContext, policy: ReconnectPolicy, ping_interval: Duration) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::idle(policy.max_attempts));
        Self {
            ctx,
            policy,
            ping_interval,
            store: Arc::new(StateStore::new()),
            listeners: Arc::new(Listeners::default()),
            status_tx: Arc::new(status_tx),
            status_rx,
            session: None,
        }
    }

    /// Create a transport and subscribe to `lab` right away
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(ctx: ConnectionContext, policy: ReconnectPolicy, lab: LabId) -> Self {
        let mut transport = Self::new(ctx, policy, DEFAULT_PING_INTERVAL);
        transport.set_lab(lab);
        transport
    }

    /// Lab currently subscribed to
    pub fn lab(&self) -> Option<&LabId> {
        self.session.as_ref().map(|session| &session.lab)
    }

    /// Subscribe to `lab`, dropping the previous subscription
    ///
    /// The store is cleared and the attempt counter reset synchronously,
    /// before the new socket is opened. Subscribing to the current lab again
    /// is a no-op. Must be called from within a tokio runtime.
    pub fn set_lab(&mut self, lab: LabId) {
        if self.lab() == Some(&lab) {
            return;
        }

        if let Some(previous) = self.lab() {
            tracing::info!(from = %previous, to = %lab, "Switching state-sync lab");
        }
        self.stop_session();

        let generation = self.store.reset();
        self.status_tx
            .send_replace(ConnectionStatus::connecting(self.policy.max_attempts));

        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = SyncTask {
            ctx: self.ctx.clone(),
            lab: lab.clone(),
            reconnect: ReconnectState::new(self.policy),
            ping_interval: self.ping_interval,
            generation,
            store: Arc::clone(&self.store),
            listeners: Arc::clone(&self.listeners),
            status: Arc::clone(&self.status_tx),
            cancel: cancel.clone(),
            commands: command_rx,
        };

        tracing::debug!(lab = %lab, generation, "Opening state-sync transport");
        let task = tokio::spawn(task.run());

        self.session = Some(SyncSession {
            lab,
            cancel,
            commands: command_tx,
            task,
        });
    }

    /// Drop the subscription and clear the store
    ///
    /// Status goes back to idle: disconnected with no attempt pending.
    pub fn disconnect(&mut self) {
        self.stop_session();
        self.store.reset();
        self.status_tx
            .send_replace(ConnectionStatus::idle(self.policy.max_attempts));
    }

    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(lab = %session.lab, "Closing state-sync transport");
            session.cancel.cancel();
        }
    }

    /// Ask the orchestrator to resend snapshots
    ///
    /// Sent only if the socket is open right now; otherwise nothing happens
    /// and nothing is queued. Returns whether the request was sent.
    pub fn refresh(&self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if !self.status_rx.borrow().is_connected() {
            tracing::debug!(lab = %session.lab, "Refresh skipped: not connected");
            return false;
        }
        session.commands.send(SyncCommand::Refresh).is_ok()
    }

    /// Shared state store
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Copy of the node snapshots
    pub fn node_states(&self) -> std::collections::HashMap<String, NodeStateEntry> {
        self.store.node_states()
    }

    /// Copy of the link snapshots
    pub fn link_states(&self) -> std::collections::HashMap<String, LinkStateEntry> {
        self.store.link_states()
    }

    /// Current lab state
    pub fn lab_state(&self) -> Option<LabState> {
        self.store.lab_state()
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch connection status; survives lab switches
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Called for every node snapshot received
    pub fn on_node_state(&self, listener: impl Fn(&NodeStateEntry) + Send + Sync + 'static) {
        store_listener(&self.listeners.node, Arc::new(listener));
    }

    /// Called for every link snapshot received
    pub fn on_link_state(&self, listener: impl Fn(&LinkStateEntry) + Send + Sync + 'static) {
        store_listener(&self.listeners.link, Arc::new(listener));
    }

    /// Called whenever the lab state changes
    pub fn on_lab_state(&self, listener: impl Fn(&LabState) + Send + Sync + 'static) {
        store_listener(&self.listeners.lab, Arc::new(listener));
    }

    /// Called for every job progress report
    pub fn on_job_progress(&self, listener: impl Fn(&JobProgress) + Send + Sync + 'static) {
        store_listener(&self.listeners.job, Arc::new(listener));
    }

    /// Close and wait for the socket task to finish
    pub async fn shutdown(mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            if let Err(e) = session.task.await {
                tracing::warn!("State-sync task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for StateSyncTransport {
    fn drop(&mut self) {
        self.stop_session();
    }
}

enum SessionEnd {
    Teardown,
    Lost(String),
}

struct SyncTask {
    ctx: ConnectionContext,
    lab: LabId,
    reconnect: ReconnectState,
    ping_interval: Duration,
    generation: u64,
    store: Arc<StateStore>,
    listeners: Arc<Listeners>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    cancel: CancellationToken,
    commands: mpsc::UnboundedReceiver<SyncCommand>,
}

impl SyncTask {
    async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.reconnect.on_connecting();
            self.publish();

            let token = self.ctx.token();
            let url = state_sync_url(&self.ctx.origin, &self.lab, token.as_deref());

            let connector = Arc::clone(&self.ctx.connector);
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = connector.connect(&url) => result,
            };

            match result {
                Ok(mut socket) => {
                    if self.cancel.is_cancelled() {
                        socket.close().await;
                        break;
                    }

                    self.reconnect.on_open();
                    self.publish();
                    tracing::info!(lab = %self.lab, "State sync connected");

                    match self.pump(socket.as_mut()).await {
                        SessionEnd::Teardown => {
                            socket.close().await;
                            break;
                        }
                        SessionEnd::Lost(reason) => {
                            tracing::debug!(lab = %self.lab, "State-sync socket lost: {}", reason);
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(lab = %self.lab, "State-sync connect failed: {}", e);
                }
            }

            if self.cancel.is_cancelled() || !self.wait_for_retry().await {
                break;
            }
        }

        tracing::debug!(lab = %self.lab, "State-sync task finished");
    }

    async fn pump(&mut self, socket: &mut dyn Socket) -> SessionEnd {
        let mut ping =
            tokio::time::interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEnd::Teardown,

                command = self.commands.recv() => match command {
                    Some(SyncCommand::Refresh) => {
                        tracing::debug!(lab = %self.lab, "Requesting state refresh");
                        if let Err(reason) = send_frame(socket, ClientFrame::Refresh).await {
                            return SessionEnd::Lost(reason);
                        }
                    }
                    None => return SessionEnd::Teardown,
                },

                _ = ping.tick() => {
                    tracing::trace!(lab = %self.lab, "Sending keepalive ping");
                    if let Err(reason) = send_frame(socket, ClientFrame::Ping).await {
                        return SessionEnd::Lost(reason);
                    }
                }

                message = socket.recv() => match message {
                    Some(Ok(message)) => self.handle_message(message),
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("closed by peer".to_string()),
                },
            }
        }
    }

    fn handle_message(&self, message: SocketMessage) {
        let text = match message {
            SocketMessage::Text(text) => text,
            SocketMessage::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!(lab = %self.lab, "Ignoring non-UTF-8 state-sync frame");
                    return;
                }
            },
        };

        match StateEvent::decode(&text) {
            Ok(event) => self.dispatch(event),
            Err(e) => tracing::debug!(lab = %self.lab, "Ignoring state-sync frame: {}", e),
        }
    }

    /// Whether this task still owns the store
    ///
    /// A lab switch or disconnect on another thread can land between two
    /// listener calls, so this is checked before each one.
    fn is_current(&self) -> bool {
        !self.cancel.is_cancelled() && self.store.generation() == self.generation
    }

    fn notify<T>(&self, slot: &RwLock<Option<Listener<T>>>, items: &[T]) {
        let Some(listener) = load(slot) else {
            return;
        };
        for item in items {
            if !self.is_current() {
                tracing::trace!(lab = %self.lab, "Session replaced during dispatch");
                return;
            }
            listener(item);
        }
    }

    fn dispatch(&self, event: StateEvent) {
        if self.cancel.is_cancelled() || !self.store.apply(self.generation, &event) {
            tracing::trace!(lab = %self.lab, "Dropping event from stale session");
            return;
        }

        match event {
            StateEvent::InitialState(nodes) => self.notify(&self.listeners.node, &nodes),
            StateEvent::NodeState(node) => {
                self.notify(&self.listeners.node, std::slice::from_ref(&node))
            }
            StateEvent::InitialLinks(links) => self.notify(&self.listeners.link, &links),
            StateEvent::LinkState(link) => {
                self.notify(&self.listeners.link, std::slice::from_ref(&link))
            }
            StateEvent::LabState(lab) => {
                self.notify(&self.listeners.lab, std::slice::from_ref(&lab))
            }
            StateEvent::JobProgress(job) => {
                self.notify(&self.listeners.job, std::slice::from_ref(&job))
            }
            StateEvent::Liveness(kind) => {
                tracing::trace!(lab = %self.lab, "Liveness: {}", kind.as_str());
            }
        }
    }

    /// Returns `false` when the session was torn down while waiting
    async fn wait_for_retry(&mut self) -> bool {
        let delay = self.reconnect.schedule();
        self.publish();

        let timer = async move {
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        if let Some(delay) = delay {
            tracing::debug!(
                lab = %self.lab,
                attempt = self.reconnect.attempt(),
                "Reconnecting state sync in {:?}",
                delay
            );
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,

                command = self.commands.recv() => match command {
                    Some(SyncCommand::Refresh) => {
                        tracing::trace!(lab = %self.lab, "Refresh dropped: not connected");
                    }
                    None => return false,
                },

                _ = &mut timer => return true,
            }
        }
    }

    fn publish(&self) {
        let status = self.reconnect.status();
        // Checked under the channel lock so a replaced session cannot
        // overwrite the status set by set_lab or disconnect
        self.status.send_if_modified(|current| {
            if !self.is_current() {
                return false;
            }
            *current = status;
            true
        });
    }
}

async fn send_frame(socket: &mut dyn Socket, frame: ClientFrame) -> Result<(), String> {
    let text = frame
        .encode(current_timestamp())
        .map_err(|e| e.to_string())?;
    socket
        .send(SocketMessage::Text(text))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use lc_core::traits::Connector;
    use lc_core::{ConnectionPhase, StaticCredentials, TransportError};
    use lc_protocol::Origin;

    use super::*;

    struct Unreachable;

    #[async_trait]
    impl Connector for Unreachable {
        async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError> {
            Err(TransportError::ConnectFailed {
                url: url.to_string(),
                reason: "unreachable".to_string(),
            })
        }
    }

    fn task(store: Arc<StateStore>, listeners: Arc<Listeners>) -> SyncTask {
        let ctx = ConnectionContext::new(
            Origin::parse("https://lab.example").unwrap(),
            Arc::new(StaticCredentials::new(None)),
            Arc::new(Unreachable),
        );
        let (status, _) = watch::channel(ConnectionStatus::idle(None));
        let (_, commands) = mpsc::unbounded_channel();
        SyncTask {
            ctx,
            lab: LabId::new("lab-1"),
            reconnect: ReconnectState::new(ReconnectPolicy::STATE_SYNC),
            ping_interval: DEFAULT_PING_INTERVAL,
            generation: store.reset(),
            store,
            listeners,
            status: Arc::new(status),
            cancel: CancellationToken::new(),
            commands,
        }
    }

    fn initial_state() -> StateEvent {
        let text = json!({
            "type": "initial_state",
            "timestamp": "2026-01-01T00:00:00.000Z",
            "data": {"nodes": [
                {"node_id": "r1", "actual_state": "running", "is_ready": true},
                {"node_id": "r2", "actual_state": "booting"},
            ]},
        })
        .to_string();
        StateEvent::decode(&text).unwrap()
    }

    #[test]
    fn test_listener_stops_when_store_is_reset_mid_dispatch() {
        let store = Arc::new(StateStore::new());
        let listeners = Arc::new(Listeners::default());
        let task = task(Arc::clone(&store), Arc::clone(&listeners));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let switching = Arc::clone(&store);
        store_listener(
            &listeners.node,
            Arc::new(move |_: &NodeStateEntry| {
                counter.fetch_add(1, Ordering::SeqCst);
                // Another lab takes over while the snapshot is being handed out
                switching.reset();
            }) as Listener<NodeStateEntry>,
        );

        task.dispatch(initial_state());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_not_called_after_cancel() {
        let store = Arc::new(StateStore::new());
        let listeners = Arc::new(Listeners::default());
        let task = task(Arc::clone(&store), Arc::clone(&listeners));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store_listener(
            &listeners.node,
            Arc::new(move |_: &NodeStateEntry| {
                counter.fetch_add(1, Ordering::SeqCst);
            }) as Listener<NodeStateEntry>,
        );

        task.dispatch(initial_state());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        task.cancel.cancel();
        task.dispatch(initial_state());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_task_cannot_publish() {
        let store = Arc::new(StateStore::new());
        let mut task = task(Arc::clone(&store), Arc::new(Listeners::default()));
        let status = task.status.subscribe();

        task.reconnect.on_open();
        task.publish();
        assert_eq!(status.borrow().phase, ConnectionPhase::Connected);

        task.status.send_replace(ConnectionStatus::idle(None));
        store.reset();
        let _ = task.reconnect.schedule();
        task.publish();

        assert_eq!(*status.borrow(), ConnectionStatus::idle(None));
    }
}
