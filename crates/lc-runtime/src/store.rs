//! Lab state store
//!
//! Holds the latest node, link and lab snapshots pushed over the state-sync
//! socket. The transport is the only writer; everyone else reads copies.
//!
//! Every write carries the generation of the socket session that produced
//! it. A re-key bumps the generation while clearing, so an event still in
//! flight from the previous lab is rejected instead of resurrecting stale
//! state.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lc_protocol::{LabState, LinkStateEntry, NodeStateEntry, StateEvent};

#[derive(Debug, Default)]
struct StoreInner {
    generation: u64,
    nodes: HashMap<String, NodeStateEntry>,
    links: HashMap<String, LinkStateEntry>,
    lab: Option<LabState>,
}

/// Latest orchestrator-pushed state for the subscribed lab
#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<StoreInner>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Copy of every node snapshot, keyed by node id
    pub fn node_states(&self) -> HashMap<String, NodeStateEntry> {
        self.read().nodes.clone()
    }

    /// Snapshot of one node
    pub fn node_state(&self, node_id: &str) -> Option<NodeStateEntry> {
        self.read().nodes.get(node_id).cloned()
    }

    /// Copy of every link snapshot, keyed by link name
    pub fn link_states(&self) -> HashMap<String, LinkStateEntry> {
        self.read().links.clone()
    }

    /// Snapshot of one link
    pub fn link_state(&self, link_name: &str) -> Option<LinkStateEntry> {
        self.read().links.get(link_name).cloned()
    }

    /// Current lab state
    pub fn lab_state(&self) -> Option<LabState> {
        self.read().lab.clone()
    }

    /// Whether the node reported ready; unknown nodes are not ready
    pub fn is_node_ready(&self, node_id: &str) -> bool {
        self.read()
            .nodes
            .get(node_id)
            .map_or(false, |node| node.is_ready)
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        let inner = self.read();
        inner.nodes.is_empty() && inner.links.is_empty() && inner.lab.is_none()
    }

    /// Generation accepted by [`apply`](Self::apply)
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Drop everything and start a new generation
    pub(crate) fn reset(&self) -> u64 {
        let mut inner = self.write();
        inner.generation += 1;
        inner.nodes.clear();
        inner.links.clear();
        inner.lab = None;
        inner.generation
    }

    /// Apply an event produced by session `generation`
    ///
    /// Returns `false` without touching anything when the generation is
    /// stale. Job progress and liveness events are accepted but not stored.
    pub(crate) fn apply(&self, generation: u64, event: &StateEvent) -> bool {
        let mut inner = self.write();
        if inner.generation != generation {
            return false;
        }

        match event {
            StateEvent::InitialState(nodes) => {
                for node in nodes {
                    inner.nodes.insert(node.node_id.clone(), node.clone());
                }
            }
            StateEvent::NodeState(node) => {
                inner.nodes.insert(node.node_id.clone(), node.clone());
            }
            StateEvent::InitialLinks(links) => {
                for link in links {
                    inner.links.insert(link.link_name.clone(), link.clone());
                }
            }
            StateEvent::LinkState(link) => {
                inner.links.insert(link.link_name.clone(), link.clone());
            }
            StateEvent::LabState(lab) => {
                inner.lab = Some(lab.clone());
            }
            StateEvent::JobProgress(_) | StateEvent::Liveness(_) => {}
        }
        true
    }
}
