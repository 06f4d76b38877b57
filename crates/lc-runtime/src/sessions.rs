//! Console sessions behind window tabs
//!
//! [`ConsoleSessions`] owns one [`TerminalSurface`] per console tab and
//! keeps that set in step with a [`WindowManager`]: a tab that appears gets
//! a session, a tab that closes loses it. Docking hands the sessions over
//! untouched so the bottom panel keeps the same sockets.
//!
//! Merging and splitting windows move tabs without opening or closing them,
//! so they never touch a session.

use std::collections::HashMap;
use std::sync::Arc;

use lc_core::traits::TerminalFactory;
use lc_core::ReconnectPolicy;
use lc_protocol::LabId;
use lc_windows::{TabId, WindowManager, WmEvent};

use crate::console::ConsoleTarget;
use crate::context::ConnectionContext;
use crate::store::StateStore;
use crate::surface::TerminalSurface;

struct Registration {
    target: ConsoleTarget,
    ready: bool,
}

/// Terminal surfaces keyed by window tab
pub struct ConsoleSessions {
    ctx: ConnectionContext,
    policy: ReconnectPolicy,
    factory: Arc<dyn TerminalFactory>,
    registered: HashMap<TabId, Registration>,
    open: HashMap<TabId, TerminalSurface>,
    docked: HashMap<TabId, TerminalSurface>,
}

impl ConsoleSessions {
    /// Create an empty session set
    pub fn new(
        ctx: ConnectionContext,
        policy: ReconnectPolicy,
        factory: Arc<dyn TerminalFactory>,
    ) -> Self {
        Self {
            ctx,
            policy,
            factory,
            registered: HashMap::new(),
            open: HashMap::new(),
            docked: HashMap::new(),
        }
    }

    /// Tab identifier used for `target`
    pub fn tab_id(target: &ConsoleTarget) -> TabId {
        TabId::new(target.to_string())
    }

    /// Remember which console a tab shows
    ///
    /// The session itself is created when the window manager reports the
    /// tab as opened. Registering an open tab only updates its readiness.
    pub fn register(&mut self, target: ConsoleTarget, ready: bool) -> TabId {
        let tab = Self::tab_id(&target);
        if let Some(surface) = self.open.get_mut(&tab) {
            surface.set_ready(ready);
        }
        self.registered.insert(tab.clone(), Registration { target, ready });
        tab
    }

    /// Register `target` and show its tab
    ///
    /// Call [`sync`](Self::sync) afterwards to create the session.
    pub fn open(&mut self, wm: &mut WindowManager, target: ConsoleTarget, ready: bool) -> TabId {
        let tab = self.register(target, ready);
        wm.open_console(tab.clone());
        tab
    }

    /// Apply pending window manager events
    ///
    /// Returns the events left for the host: [`WmEvent::Docked`] and the
    /// pointer-capture notifications.
    pub fn sync(&mut self, wm: &mut WindowManager) -> Vec<WmEvent> {
        let mut host = Vec::new();
        for event in wm.take_events() {
            match event {
                WmEvent::ConsoleOpened { tab, .. } => self.attach(tab),
                WmEvent::ConsoleClosed { tab, .. } => self.detach(&tab),
                WmEvent::Docked { window, tabs } => {
                    for tab in &tabs {
                        if let Some(surface) = self.open.remove(tab) {
                            self.docked.insert(tab.clone(), surface);
                        }
                    }
                    tracing::debug!(window = %window, tabs = tabs.len(), "Sessions docked");
                    host.push(WmEvent::Docked { window, tabs });
                }
                other => host.push(other),
            }
        }
        host
    }

    fn attach(&mut self, tab: TabId) {
        if self.open.contains_key(&tab) {
            return;
        }
        if let Some(surface) = self.docked.remove(&tab) {
            tracing::debug!(tab = %tab, "Session undocked");
            self.open.insert(tab, surface);
            return;
        }
        let Some(registration) = self.registered.get(&tab) else {
            tracing::warn!(tab = %tab, "No console registered for tab");
            return;
        };

        tracing::info!(tab = %tab, "Opening console session");
        let surface = TerminalSurface::open(
            self.ctx.clone(),
            self.policy,
            Arc::clone(&self.factory),
            registration.target.clone(),
            registration.ready,
        );
        self.open.insert(tab, surface);
    }

    fn detach(&mut self, tab: &TabId) {
        self.registered.remove(tab);
        if let Some(mut surface) = self.open.remove(tab) {
            tracing::info!(tab = %tab, "Closing console session");
            surface.close();
        }
    }

    /// Session shown in a floating tab
    pub fn surface(&self, tab: &TabId) -> Option<&TerminalSurface> {
        self.open.get(tab)
    }

    /// Mutable access to a floating tab's session
    pub fn surface_mut(&mut self, tab: &TabId) -> Option<&mut TerminalSurface> {
        self.open.get_mut(tab)
    }

    /// Session handed to the bottom panel
    pub fn docked(&self, tab: &TabId) -> Option<&TerminalSurface> {
        self.docked.get(tab)
    }

    /// Take ownership of a docked session
    pub fn take_docked(&mut self, tab: &TabId) -> Option<TerminalSurface> {
        self.registered.remove(tab);
        self.docked.remove(tab)
    }

    /// Close a docked session
    pub fn close_docked(&mut self, tab: &TabId) -> bool {
        match self.take_docked(tab) {
            Some(mut surface) => {
                surface.close();
                true
            }
            None => false,
        }
    }

    /// Whether a floating tab has a session
    pub fn contains(&self, tab: &TabId) -> bool {
        self.open.contains_key(tab)
    }

    /// Number of floating sessions
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether no floating session is open
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Set readiness of one tab's node
    pub fn set_ready(&mut self, tab: &TabId, ready: bool) {
        if let Some(registration) = self.registered.get_mut(tab) {
            registration.ready = ready;
        }
        if let Some(surface) = self.open.get_mut(tab).or_else(|| self.docked.get_mut(tab)) {
            surface.set_ready(ready);
        }
    }

    /// Refresh readiness of every session in `lab` from its state store
    pub fn update_readiness(&mut self, lab: &LabId, store: &StateStore) {
        for (tab, registration) in self.registered.iter_mut() {
            if registration.target.lab != *lab {
                continue;
            }
            let ready = store.is_node_ready(registration.target.node.as_str());
            registration.ready = ready;
            if let Some(surface) = self.open.get_mut(tab).or_else(|| self.docked.get_mut(tab)) {
                surface.set_ready(ready);
            }
        }
    }

    /// Close every session, floating and docked
    pub fn close_all(&mut self) {
        for (tab, mut surface) in self.open.drain().chain(self.docked.drain()) {
            tracing::debug!(tab = %tab, "Closing console session");
            surface.close();
        }
        self.registered.clear();
    }
}

impl Drop for ConsoleSessions {
    fn drop(&mut self) {
        self.close_all();
    }
}
