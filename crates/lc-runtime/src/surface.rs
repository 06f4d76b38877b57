//! Terminal surface
//!
//! A [`TerminalSurface`] is what a console tab holds: a terminal widget, the
//! console transport feeding it, and the boot-readiness overlay. Changing
//! the lab or node it shows tears both down and builds fresh ones, so
//! nothing from the previous identity can reach the new widget.

use std::sync::Arc;

use tokio::sync::watch;

use lc_core::traits::{TerminalFactory, TerminalWidget};
use lc_core::{ConnectionStatus, ReconnectPolicy};

use crate::console::{ConsoleModeState, ConsoleTarget, ConsoleTransport};
use crate::context::ConnectionContext;

/// Boot-readiness overlay state
///
/// The overlay shows while the node is not ready. Dismissing it is sticky:
/// it stays hidden even if readiness later drops again. Readiness turning
/// true hides it regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessGate {
    ready: bool,
    dismissed: bool,
}

impl ReadinessGate {
    /// Gate for a node with the given readiness
    pub fn new(ready: bool) -> Self {
        Self {
            ready,
            dismissed: false,
        }
    }

    /// Update the externally supplied readiness flag
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Operator dismissed the overlay
    pub fn dismiss(&mut self) {
        self.dismissed = true;
    }

    /// Whether the node reported ready
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the overlay should be drawn
    pub fn overlay_visible(&self) -> bool {
        !self.ready && !self.dismissed
    }
}

/// A console tab: terminal widget plus the transport feeding it
pub struct TerminalSurface {
    ctx: ConnectionContext,
    policy: ReconnectPolicy,
    factory: Arc<dyn TerminalFactory>,
    terminal: Arc<dyn TerminalWidget>,
    transport: ConsoleTransport,
    gate: ReadinessGate,
    closed: bool,
}

impl TerminalSurface {
    /// Create the widget and open the console for `target`
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        ctx: ConnectionContext,
        policy: ReconnectPolicy,
        factory: Arc<dyn TerminalFactory>,
        target: ConsoleTarget,
        ready: bool,
    ) -> Self {
        let (terminal, transport) = Self::attach(&ctx, policy, factory.as_ref(), target);
        Self {
            ctx,
            policy,
            factory,
            terminal,
            transport,
            gate: ReadinessGate::new(ready),
            closed: false,
        }
    }

    fn attach(
        ctx: &ConnectionContext,
        policy: ReconnectPolicy,
        factory: &dyn TerminalFactory,
        target: ConsoleTarget,
    ) -> (Arc<dyn TerminalWidget>, ConsoleTransport) {
        let terminal = factory.create(&target.lab, &target.node);
        let transport = ConsoleTransport::open(ctx.clone(), policy, target, Arc::clone(&terminal));

        let input = transport.input();
        terminal.on_data(Box::new(move |data| {
            input.send(data);
        }));

        (terminal, transport)
    }

    /// Identity currently shown
    pub fn target(&self) -> &ConsoleTarget {
        self.transport.target()
    }

    /// Re-key to another node or lab
    ///
    /// The old transport is cancelled and its widget disposed before the
    /// new ones are created. Re-keying to the current identity is a no-op.
    pub fn set_target(&mut self, target: ConsoleTarget, ready: bool) {
        if self.closed || *self.transport.target() == target {
            return;
        }

        tracing::info!(from = %self.transport.target(), to = %target, "Re-keying console");
        self.teardown();

        let (terminal, transport) =
            Self::attach(&self.ctx, self.policy, self.factory.as_ref(), target);
        self.terminal = terminal;
        self.transport = transport;
        self.gate = ReadinessGate::new(ready);
    }

    /// Update the node's boot readiness
    pub fn set_ready(&mut self, ready: bool) {
        self.gate.set_ready(ready);
    }

    /// Dismiss the boot overlay for this identity
    pub fn dismiss_overlay(&mut self) {
        self.gate.dismiss();
    }

    /// Whether the boot overlay should be drawn
    pub fn overlay_visible(&self) -> bool {
        self.gate.overlay_visible()
    }

    /// Readiness gate state
    pub fn readiness(&self) -> ReadinessGate {
        self.gate
    }

    /// Connection status of the current transport
    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Watch connection status of the current transport
    ///
    /// A re-key replaces the transport; subscribe again afterwards.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.transport.subscribe_status()
    }

    /// Current interactivity
    pub fn mode(&self) -> ConsoleModeState {
        self.transport.mode()
    }

    /// Watch interactivity of the current transport
    ///
    /// Like [`subscribe_status`](Self::subscribe_status), this does not
    /// survive a re-key.
    pub fn subscribe_mode(&self) -> watch::Receiver<ConsoleModeState> {
        self.transport.subscribe_mode()
    }

    /// Whether keystrokes are forwarded
    pub fn is_interactive(&self) -> bool {
        self.transport.is_interactive()
    }

    /// Retry the connection now; see [`ConsoleTransport::reconnect_now`]
    pub fn reconnect_now(&self) -> bool {
        self.transport.reconnect_now()
    }

    /// Fit the widget to its container
    pub fn fit(&self) {
        if !self.closed {
            self.terminal.fit();
        }
    }

    /// The current terminal widget
    pub fn terminal(&self) -> &Arc<dyn TerminalWidget> {
        &self.terminal
    }

    /// Close the console and dispose of the widget
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.teardown();
        self.closed = true;
    }

    fn teardown(&mut self) {
        // Cancel first so the socket task cannot write after disposal
        if let Some(terminal) = self.transport.close() {
            terminal.dispose();
        }
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_visible_until_ready() {
        let mut gate = ReadinessGate::new(false);
        assert!(gate.overlay_visible());

        gate.set_ready(true);
        assert!(!gate.overlay_visible());
    }

    #[test]
    fn test_dismissal_is_sticky() {
        let mut gate = ReadinessGate::new(false);
        gate.dismiss();
        assert!(!gate.overlay_visible());

        gate.set_ready(true);
        gate.set_ready(false);
        assert!(!gate.overlay_visible());
    }

    #[test]
    fn test_overlay_returns_when_not_dismissed() {
        let mut gate = ReadinessGate::new(true);
        assert!(!gate.overlay_visible());
        gate.set_ready(false);
        assert!(gate.overlay_visible());
    }
}
