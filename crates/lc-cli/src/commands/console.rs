//! Console command: attach the local terminal to a device console

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use bytes::Bytes;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use lc_core::config::ClientConfig;
use lc_core::traits::{InputHandler, TerminalFactory, TerminalWidget};
use lc_core::ConnectionPhase;
use lc_protocol::{LabId, NodeId};
use lc_runtime::{ConnectionContext, ConsoleSessions, ConsoleTarget, StateSyncTransport};
use lc_windows::WindowManager;

use crate::output::{print_info, print_raw_status, print_success};

/// Terminal widget backed by the process's stdout
///
/// Keystrokes read from the local terminal are fed in through
/// [`StdoutTerminal::feed`], which hands them to whatever handler the
/// console registered.
#[derive(Default)]
pub struct StdoutTerminal {
    handler: Mutex<Option<InputHandler>>,
    disposed: Mutex<bool>,
}

impl StdoutTerminal {
    /// Deliver keystrokes to the registered handler
    pub fn feed(&self, data: Bytes) {
        if let Ok(guard) = self.handler.lock() {
            if let Some(handler) = guard.as_ref() {
                handler(data);
            }
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.lock().map(|d| *d).unwrap_or(true)
    }
}

impl TerminalWidget for StdoutTerminal {
    fn write(&self, data: &[u8]) {
        if self.is_disposed() {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(data).and_then(|_| stdout.flush()) {
            tracing::warn!("Failed to write console output: {}", e);
        }
    }

    fn on_data(&self, handler: InputHandler) {
        if let Ok(mut guard) = self.handler.lock() {
            *guard = Some(handler);
        }
    }

    fn focus(&self) {}

    fn fit(&self) {
        if let Ok((cols, rows)) = crossterm::terminal::size() {
            tracing::trace!(cols, rows, "Terminal resized");
        }
    }

    fn dispose(&self) {
        if let Ok(mut disposed) = self.disposed.lock() {
            *disposed = true;
        }
        if let Ok(mut guard) = self.handler.lock() {
            guard.take();
        }
    }
}

/// Hands out [`StdoutTerminal`]s and remembers the latest one
#[derive(Default)]
pub struct StdoutTerminalFactory {
    latest: Mutex<Option<Arc<StdoutTerminal>>>,
}

impl StdoutTerminalFactory {
    /// Terminal created most recently
    pub fn latest(&self) -> Option<Arc<StdoutTerminal>> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}

impl TerminalFactory for StdoutTerminalFactory {
    fn create(&self, lab: &LabId, node: &NodeId) -> Arc<dyn TerminalWidget> {
        tracing::debug!(lab = %lab, node = %node, "Creating stdout terminal");
        let terminal = Arc::new(StdoutTerminal::default());
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(Arc::clone(&terminal));
        }
        terminal
    }
}

/// What a key press means to the console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Leave the console (Ctrl+])
    Detach,
    /// Retry the connection right away (Ctrl+R while down)
    ReconnectNow,
    /// Forward these bytes to the device
    Send(Vec<u8>),
    /// Nothing to do
    Ignore,
}

/// Interpret a key press given the console's connection phase
///
/// Ctrl+R only retries while the console is disconnected or failed; on a
/// live console it is an ordinary keystroke for the device.
pub fn key_action(code: KeyCode, modifiers: KeyModifiers, phase: ConnectionPhase) -> KeyAction {
    if modifiers.contains(KeyModifiers::CONTROL) {
        match code {
            KeyCode::Char(']') => return KeyAction::Detach,
            KeyCode::Char('r') | KeyCode::Char('R')
                if matches!(
                    phase,
                    ConnectionPhase::Disconnected | ConnectionPhase::Failed
                ) =>
            {
                return KeyAction::ReconnectNow
            }
            _ => {}
        }
    }

    let data = key_to_bytes(code, modifiers);
    if data.is_empty() {
        KeyAction::Ignore
    } else {
        KeyAction::Send(data)
    }
}

/// Encode a key press the way a VT100-style terminal would
pub fn key_to_bytes(code: KeyCode, modifiers: KeyModifiers) -> Vec<u8> {
    use KeyCode::*;

    match code {
        Char(c) => {
            if modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                // Ctrl+A = 0x01 .. Ctrl+Z = 0x1a
                vec![(c.to_ascii_lowercase() as u8) - b'a' + 1]
            } else if modifiers.contains(KeyModifiers::ALT) {
                let mut data = vec![0x1b];
                data.extend_from_slice(c.to_string().as_bytes());
                data
            } else {
                c.to_string().into_bytes()
            }
        }
        Enter => vec![b'\r'],
        Tab => vec![b'\t'],
        BackTab => b"\x1b[Z".to_vec(),
        Backspace => vec![0x7f],
        Esc => vec![0x1b],
        Up => b"\x1b[A".to_vec(),
        Down => b"\x1b[B".to_vec(),
        Right => b"\x1b[C".to_vec(),
        Left => b"\x1b[D".to_vec(),
        Home => b"\x1b[H".to_vec(),
        End => b"\x1b[F".to_vec(),
        PageUp => b"\x1b[5~".to_vec(),
        PageDown => b"\x1b[6~".to_vec(),
        Delete => b"\x1b[3~".to_vec(),
        Insert => b"\x1b[2~".to_vec(),
        F(n) => match n {
            1 => b"\x1bOP".to_vec(),
            2 => b"\x1bOQ".to_vec(),
            3 => b"\x1bOR".to_vec(),
            4 => b"\x1bOS".to_vec(),
            5 => b"\x1b[15~".to_vec(),
            6 => b"\x1b[17~".to_vec(),
            7 => b"\x1b[18~".to_vec(),
            8 => b"\x1b[19~".to_vec(),
            9 => b"\x1b[20~".to_vec(),
            10 => b"\x1b[21~".to_vec(),
            11 => b"\x1b[23~".to_vec(),
            12 => b"\x1b[24~".to_vec(),
            _ => vec![],
        },
        _ => vec![],
    }
}

/// Attach to the console of `node` in `lab` until the user detaches
///
/// The lab's state stream runs alongside the console so the boot overlay
/// follows the node's reported readiness.
pub async fn console_command(
    ctx: ConnectionContext,
    config: &ClientConfig,
    lab: &str,
    node: &str,
) -> Result<()> {
    use crossterm::{
        event::{self, Event, KeyEvent, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode},
    };

    let target = ConsoleTarget::new(lab, node);
    print_info(&format!("Attaching to {}... (Ctrl+] to detach, Ctrl+R to retry)", target));

    let mut state = StateSyncTransport::new(ctx.clone(), config.state_sync, config.ping_interval);
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<()>();
    let watched = target.node.clone();
    state.on_node_state(move |entry| {
        if entry.node_id == watched.as_str() {
            let _ = ready_tx.send(());
        }
    });
    state.set_lab(target.lab.clone());

    let factory = Arc::new(StdoutTerminalFactory::default());
    let mut wm = WindowManager::new();
    let mut sessions = ConsoleSessions::new(
        ctx,
        config.console,
        Arc::clone(&factory) as Arc<dyn TerminalFactory>,
    );
    let ready = state.store().is_node_ready(node);
    let tab = sessions.open(&mut wm, target.clone(), ready);
    sessions.sync(&mut wm);

    let surface = sessions
        .surface(&tab)
        .ok_or_else(|| anyhow::anyhow!("Console session was not opened"))?;
    let terminal = factory
        .latest()
        .ok_or_else(|| anyhow::anyhow!("Console terminal was not created"))?;

    let mut status = surface.subscribe_status();
    let mut mode = surface.subscribe_mode();
    let mut overlay = surface.overlay_visible();

    enable_raw_mode()?;
    if overlay {
        print_raw_status(&format!("[{} is not ready yet]", target.node));
    }

    let (event_tx, mut event_rx) = mpsc::channel::<Event>(256);
    let event_handle = tokio::task::spawn_blocking(move || loop {
        if event::poll(std::time::Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(evt) = event::read() {
                if event_tx.blocking_send(evt).is_err() {
                    break;
                }
            }
        }
        if event_tx.is_closed() {
            break;
        }
    });

    loop {
        let Some(surface) = sessions.surface(&tab) else {
            break;
        };

        tokio::select! {
            Some(evt) = event_rx.recv() => match evt {
                Event::Key(KeyEvent { code, modifiers, kind, .. }) if kind != KeyEventKind::Release => {
                    match key_action(code, modifiers, surface.status().phase) {
                        KeyAction::Detach => break,
                        KeyAction::ReconnectNow => {
                            surface.reconnect_now();
                        }
                        KeyAction::Send(data) => terminal.feed(Bytes::from(data)),
                        KeyAction::Ignore => {}
                    }
                }
                Event::Resize(..) => surface.fit(),
                _ => {}
            },
            Some(()) = ready_rx.recv() => {
                sessions.update_readiness(&target.lab, state.store());
                let visible = sessions.surface(&tab).map_or(false, |s| s.overlay_visible());
                if visible != overlay {
                    overlay = visible;
                    if visible {
                        print_raw_status(&format!("[{} is not ready yet]", target.node));
                    } else {
                        print_raw_status(&format!("[{} is ready]", target.node));
                    }
                }
            }
            Ok(()) = status.changed() => {
                let current = *status.borrow_and_update();
                tracing::debug!(phase = %current.phase, attempt = current.attempt, "Console status");
                if let Some(text) = current.overlay_text() {
                    print_raw_status(&format!("[{}]", text));
                }
            }
            Ok(()) = mode.changed() => {
                let current = mode.borrow_and_update().clone();
                let label = if current.interactive { "interactive" } else { "read-only" };
                match current.message {
                    Some(message) => print_raw_status(&format!("[{}: {}]", label, message)),
                    None => print_raw_status(&format!("[{}]", label)),
                }
            }
            else => break,
        }
    }

    drop(event_rx);
    event_handle.abort();
    disable_raw_mode()?;

    if let Some(window) = wm.window_of(&tab) {
        wm.close_window(window);
    }
    sessions.sync(&mut wm);
    state.shutdown().await;

    println!();
    print_success("Detached from console");
    Ok(())
}
