//! Console transport
//!
//! One socket per open device console. Inbound payloads are terminal output
//! unless they classify as a control frame, in which case they flip the
//! console between interactive and read-only. Outbound payloads are the
//! operator's keystrokes, forwarded only while the socket is open and the
//! console is interactive.
//!
//! # Lifecycle
//!
//! 1. [`ConsoleTransport::open`] spawns the socket task
//! 2. On open the attempt counter resets and the terminal is focused
//! 3. On an unintended close a one-time notice is written to the terminal
//!    and a reconnect is scheduled per the [`ReconnectPolicy`]
//! 4. Once the ceiling is hit the phase becomes `Failed`;
//!    [`ConsoleTransport::reconnect_now`] restarts from attempt 0
//! 5. [`ConsoleTransport::close`] cancels the task *before* the socket is
//!    closed, so a deliberate close never schedules a reconnect

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lc_core::traits::{Socket, SocketMessage, TerminalWidget};
use lc_core::{ConnectionPhase, ConnectionStatus, ReconnectPolicy};
use lc_protocol::{console_url, ConsoleInbound, ControlFrame, LabId, NodeId};

use crate::context::ConnectionContext;
use crate::reconnect::ReconnectState;

/// Written into the terminal the first time a console loses its socket
pub const DISCONNECT_NOTICE: &str = "\r\n\x1b[33m[connection lost, reconnecting…]\x1b[0m\r\n";

/// Identity of a console: which node in which lab
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsoleTarget {
    /// Lab the node belongs to
    pub lab: LabId,
    /// Node whose console is attached
    pub node: NodeId,
}

impl ConsoleTarget {
    /// Create a console target
    pub fn new(lab: impl Into<LabId>, node: impl Into<NodeId>) -> Self {
        Self {
            lab: lab.into(),
            node: node.into(),
        }
    }
}

impl std::fmt::Display for ConsoleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.lab, self.node)
    }
}

/// Interactivity of a console as last set by a control frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleModeState {
    /// Whether keystrokes are forwarded
    pub interactive: bool,
    /// Reason given by the orchestrator, if any
    pub message: Option<String>,
}

impl Default for ConsoleModeState {
    fn default() -> Self {
        Self {
            interactive: true,
            message: None,
        }
    }
}

#[derive(Debug)]
enum ConsoleCommand {
    Input(Bytes),
    ReconnectNow,
}

/// Terminal shared with the socket task; emptied on teardown
type TerminalSlot = Arc<Mutex<Option<Arc<dyn TerminalWidget>>>>;

/// Cloneable keystroke sink for a console
///
/// Handed to the terminal widget's data callback.
#[derive(Clone)]
pub struct ConsoleInput {
    commands: mpsc::UnboundedSender<ConsoleCommand>,
    status: watch::Receiver<ConnectionStatus>,
    mode: watch::Receiver<ConsoleModeState>,
    cancel: CancellationToken,
}

impl ConsoleInput {
    /// Forward keystrokes to the device
    ///
    /// Returns `false` when they were discarded: the console is read-only,
    /// the socket is not open, or the transport was torn down. Keystrokes
    /// are never queued for a later connection.
    pub fn send(&self, data: Bytes) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !self.status.borrow().is_connected() {
            tracing::trace!("Dropping {} input bytes: console not connected", data.len());
            return false;
        }
        if !self.mode.borrow().interactive {
            tracing::trace!("Dropping {} input bytes: console is read-only", data.len());
            return false;
        }
        self.commands.send(ConsoleCommand::Input(data)).is_ok()
    }
}

/// Handle to a running console socket task
pub struct ConsoleTransport {
    target: ConsoleTarget,
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<ConsoleCommand>,
    status: watch::Receiver<ConnectionStatus>,
    mode: watch::Receiver<ConsoleModeState>,
    terminal: TerminalSlot,
    task: Option<JoinHandle<()>>,
}

impl ConsoleTransport {
    /// Open the console socket for `target`, rendering into `terminal`
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        ctx: ConnectionContext,
        policy: ReconnectPolicy,
        target: ConsoleTarget,
        terminal: Arc<dyn TerminalWidget>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::connecting(policy.max_attempts));
        let (mode_tx, mode_rx) = watch::channel(ConsoleModeState::default());
        let terminal: TerminalSlot = Arc::new(Mutex::new(Some(terminal)));

        let task = ConsoleTask {
            ctx,
            target: target.clone(),
            cancel: cancel.clone(),
            commands: command_rx,
            status: status_tx,
            mode: mode_tx,
            terminal: Arc::clone(&terminal),
            reconnect: ReconnectState::new(policy),
            notice_written: false,
        };

        tracing::debug!(console = %target, "Opening console transport");
        let task = tokio::spawn(task.run());

        Self {
            target,
            cancel,
            commands: command_tx,
            status: status_rx,
            mode: mode_rx,
            terminal,
            task: Some(task),
        }
    }

    /// Identity this transport is bound to
    pub fn target(&self) -> &ConsoleTarget {
        &self.target
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watch connection status changes (for the reconnect overlay)
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Current interactivity
    pub fn mode(&self) -> ConsoleModeState {
        self.mode.borrow().clone()
    }

    /// Watch interactivity changes
    pub fn subscribe_mode(&self) -> watch::Receiver<ConsoleModeState> {
        self.mode.clone()
    }

    /// Whether keystrokes are currently forwarded
    pub fn is_interactive(&self) -> bool {
        self.mode.borrow().interactive
    }

    /// Keystroke sink for the terminal widget
    pub fn input(&self) -> ConsoleInput {
        ConsoleInput {
            commands: self.commands.clone(),
            status: self.status.clone(),
            mode: self.mode.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Forward keystrokes; see [`ConsoleInput::send`]
    pub fn send_input(&self, data: impl Into<Bytes>) -> bool {
        self.input().send(data.into())
    }

    /// Retry immediately with the attempt counter reset
    ///
    /// Only acts while disconnected or failed; a pending backoff timer is
    /// cancelled. Returns whether a retry was requested.
    pub fn reconnect_now(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.status().phase {
            ConnectionPhase::Disconnected | ConnectionPhase::Failed => {
                tracing::info!(console = %self.target, "Manual reconnect requested");
                self.commands.send(ConsoleCommand::ReconnectNow).is_ok()
            }
            ConnectionPhase::Connecting | ConnectionPhase::Connected => false,
        }
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tear down the console
    ///
    /// Cancels the socket task before the socket itself is closed, so no
    /// reconnect is ever scheduled for a deliberate close. Returns the
    /// terminal widget (once) so the owner can dispose of it; after this
    /// returns the task can no longer write to it.
    pub fn close(&mut self) -> Option<Arc<dyn TerminalWidget>> {
        if !self.cancel.is_cancelled() {
            tracing::debug!(console = %self.target, "Closing console transport");
        }
        self.cancel.cancel();
        match self.terminal.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Close and wait for the socket task to finish
    pub async fn shutdown(mut self) -> Option<Arc<dyn TerminalWidget>> {
        let terminal = self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(console = %self.target, "Console task ended abnormally: {}", e);
            }
        }
        terminal
    }
}

impl Drop for ConsoleTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum SessionEnd {
    /// Deliberate teardown; do not reconnect
    Teardown,
    /// Socket lost; reconnect per policy
    Lost(String),
}

enum RetryOutcome {
    Retry,
    Teardown,
}

struct ConsoleTask {
    ctx: ConnectionContext,
    target: ConsoleTarget,
    cancel: CancellationToken,
    commands: mpsc::UnboundedReceiver<ConsoleCommand>,
    status: watch::Sender<ConnectionStatus>,
    mode: watch::Sender<ConsoleModeState>,
    terminal: TerminalSlot,
    reconnect: ReconnectState,
    notice_written: bool,
}

impl ConsoleTask {
    async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.reconnect.on_connecting();
            self.publish();

            let token = self.ctx.token();
            let url = console_url(
                &self.ctx.origin,
                &self.target.lab,
                &self.target.node,
                token.as_deref(),
            );

            tracing::debug!(
                console = %self.target,
                attempt = self.reconnect.attempt(),
                "Connecting console socket"
            );

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
                    self.with_terminal(|terminal| terminal.focus());
                    tracing::info!(console = %self.target, "Console connected");

                    match self.pump(socket.as_mut()).await {
                        SessionEnd::Teardown => {
                            socket.close().await;
                            break;
                        }
                        SessionEnd::Lost(reason) => {
                            tracing::warn!(console = %self.target, "Console socket lost: {}", reason);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(console = %self.target, "Console connect failed: {}", e);
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            if !self.notice_written {
                self.notice_written = true;
                self.with_terminal(|terminal| terminal.write(DISCONNECT_NOTICE.as_bytes()));
            }

            if let RetryOutcome::Teardown = self.wait_for_retry().await {
                break;
            }
        }

        tracing::debug!(console = %self.target, "Console task finished");
    }

    /// Relay traffic until the socket drops or the console is torn down
    async fn pump(&mut self, socket: &mut dyn Socket) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEnd::Teardown,

                command = self.commands.recv() => match command {
                    Some(ConsoleCommand::Input(data)) => {
                        if !self.mode.borrow().interactive {
                            tracing::trace!("Discarding input: console is read-only");
                            continue;
                        }
                        if let Err(e) = socket.send(encode_input(data)).await {
                            return SessionEnd::Lost(e.to_string());
                        }
                    }
                    Some(ConsoleCommand::ReconnectNow) => {
                        tracing::trace!("Ignoring reconnect request: already connected");
                    }
                    None => return SessionEnd::Teardown,
                },

                message = socket.recv() => match message {
                    Some(Ok(message)) => self.handle_inbound(message),
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("closed by peer".to_string()),
                },
            }
        }
    }

    fn handle_inbound(&mut self, message: SocketMessage) {
        let inbound = match message {
            SocketMessage::Text(text) => ConsoleInbound::from_text(text),
            SocketMessage::Binary(data) => ConsoleInbound::from_binary(data),
        };

        match inbound {
            ConsoleInbound::Output(data) => {
                self.with_terminal(|terminal| terminal.write(&data));
            }
            ConsoleInbound::Control(frame) => self.apply_control(frame),
        }
    }

    fn apply_control(&mut self, frame: ControlFrame) {
        if self.cancel.is_cancelled() {
            return;
        }

        let interactive = frame.state.is_interactive();
        tracing::info!(
            console = %self.target,
            interactive,
            "Console mode changed: {}",
            frame.message
        );

        let message = Some(frame.message).filter(|m| !m.is_empty());
        self.mode.send_replace(ConsoleModeState {
            interactive,
            message,
        });
    }

    /// Wait out the backoff delay, or indefinitely once retries are exhausted
    async fn wait_for_retry(&mut self) -> RetryOutcome {
        let delay = self.reconnect.schedule();
        self.publish();

        match delay {
            Some(delay) => tracing::info!(
                console = %self.target,
                attempt = self.reconnect.attempt(),
                "Reconnecting console in {:?}",
                delay
            ),
            None => tracing::warn!(
                console = %self.target,
                "Console reconnect attempts exhausted"
            ),
        }

        let timer = async move {
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RetryOutcome::Teardown,

                command = self.commands.recv() => match command {
                    Some(ConsoleCommand::ReconnectNow) => {
                        self.reconnect.reset();
                        return RetryOutcome::Retry;
                    }
                    Some(ConsoleCommand::Input(_)) => {
                        tracing::trace!("Discarding input: console not connected");
                    }
                    None => return RetryOutcome::Teardown,
                },

                _ = &mut timer => return RetryOutcome::Retry,
            }
        }
    }

    fn publish(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.status.send_replace(self.reconnect.status());
    }

    /// Run `f` against the terminal unless the console was torn down
    ///
    /// The slot lock is held for the call, so once `close` has emptied the
    /// slot no write can land on the old widget.
    fn with_terminal(&self, f: impl FnOnce(&dyn TerminalWidget)) {
        if self.cancel.is_cancelled() {
            return;
        }
        let slot = match self.terminal.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(terminal) = slot.as_ref() {
            f(terminal.as_ref());
        }
    }
}

/// Keystrokes go out as text frames; non-UTF-8 input falls back to binary
fn encode_input(data: Bytes) -> SocketMessage {
    match std::str::from_utf8(&data) {
        Ok(text) => SocketMessage::Text(text.to_string()),
        Err(_) => SocketMessage::Binary(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_input_text() {
        assert_eq!(
            encode_input(Bytes::from_static(b"show ip route\r")),
            SocketMessage::Text("show ip route\r".to_string())
        );
    }

    #[test]
    fn test_encode_input_binary() {
        let data = Bytes::from_static(&[0xff, 0xfe]);
        assert_eq!(encode_input(data.clone()), SocketMessage::Binary(data));
    }

    #[test]
    fn test_target_display() {
        assert_eq!(ConsoleTarget::new("lab-1", "r1").to_string(), "lab-1/r1");
    }

    #[test]
    fn test_default_mode_is_interactive() {
        assert!(ConsoleModeState::default().interactive);
    }
}
