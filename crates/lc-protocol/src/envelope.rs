//! State-sync envelope and typed events
//!
//! Every message on the state-sync socket, in both directions, is a JSON
//! envelope:
//!
//! ```json
//! {"type": "node_state", "timestamp": "2026-01-01T00:00:00Z", "data": {...}}
//! ```
//!
//! [`StateEvent`] is the typed view of an inbound envelope. Outbound traffic
//! is limited to [`ClientFrame::Ping`] and [`ClientFrame::Refresh`].
//!
//! # Message Flow
//!
//! 1. Client opens the socket; the orchestrator pushes `initial_state` and
//!    `initial_links` snapshots
//! 2. Incremental `node_state`, `link_state`, `lab_state` and `job_progress`
//!    events follow as the lab changes
//! 3. The client sends `ping` periodically; the orchestrator answers `pong`
//!    and may also send unsolicited `heartbeat`s
//! 4. The client may send `refresh` to ask for fresh snapshots

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Envelope shared by every state-sync message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Sender timestamp (RFC 3339)
    #[serde(default)]
    pub timestamp: String,
    /// Event payload, absent for liveness messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Decode an envelope from a text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode to a text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Known envelope types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Full node snapshot sent after connect
    InitialState,
    /// Single node update
    NodeState,
    /// Full link snapshot sent after connect
    InitialLinks,
    /// Single link update
    LinkState,
    /// Lab-level state
    LabState,
    /// Progress of a long-running job
    JobProgress,
    /// Keepalive request
    Ping,
    /// Keepalive response
    Pong,
    /// Server liveness signal
    Heartbeat,
    /// Client request for fresh snapshots
    Refresh,
}

impl EventKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::InitialState => "initial_state",
            EventKind::NodeState => "node_state",
            EventKind::InitialLinks => "initial_links",
            EventKind::LinkState => "link_state",
            EventKind::LabState => "lab_state",
            EventKind::JobProgress => "job_progress",
            EventKind::Ping => "ping",
            EventKind::Pong => "pong",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Refresh => "refresh",
        }
    }

    /// Look up a kind by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "initial_state" => Some(EventKind::InitialState),
            "node_state" => Some(EventKind::NodeState),
            "initial_links" => Some(EventKind::InitialLinks),
            "link_state" => Some(EventKind::LinkState),
            "lab_state" => Some(EventKind::LabState),
            "job_progress" => Some(EventKind::JobProgress),
            "ping" => Some(EventKind::Ping),
            "pong" => Some(EventKind::Pong),
            "heartbeat" => Some(EventKind::Heartbeat),
            "refresh" => Some(EventKind::Refresh),
            _ => None,
        }
    }
}

/// Snapshot of one node, keyed by `node_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStateEntry {
    /// Node identifier
    pub node_id: String,
    /// Display name
    #[serde(default)]
    pub node_name: Option<String>,
    /// State the operator asked for (e.g. `running`)
    #[serde(default)]
    pub desired_state: Option<String>,
    /// State the orchestrator observed (e.g. `booting`)
    #[serde(default)]
    pub actual_state: String,
    /// Whether the device finished booting and accepts console input
    #[serde(default)]
    pub is_ready: bool,
    /// Last error reported for this node
    #[serde(default)]
    pub error_message: Option<String>,
    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Snapshot of one link, keyed by `link_name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStateEntry {
    /// Link identifier
    pub link_name: String,
    /// Requested state (`up`/`down`)
    #[serde(default)]
    pub desired_state: Option<String>,
    /// Observed state
    #[serde(default)]
    pub actual_state: String,
    /// Endpoint node of the link
    #[serde(default)]
    pub source_node: Option<String>,
    /// Other endpoint node of the link
    #[serde(default)]
    pub target_node: Option<String>,
    /// Last error reported for this link
    #[serde(default)]
    pub error_message: Option<String>,
    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lab-level state, one value per subscribed lab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabState {
    /// Lab identifier
    pub lab_id: String,
    /// Overall lab state (e.g. `running`, `stopped`)
    #[serde(default)]
    pub state: String,
    /// Last error reported for the lab
    #[serde(default)]
    pub error: Option<String>,
    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Progress report for a job; delivered to listeners, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Job identifier
    pub job_id: String,
    /// What the job does (e.g. `up`, `down`, `sync`)
    #[serde(default)]
    pub action: Option<String>,
    /// Job status (e.g. `running`, `completed`, `failed`)
    #[serde(default)]
    pub status: String,
    /// Completion percentage when known
    #[serde(default)]
    pub progress_percent: Option<f64>,
    /// Human-readable status line
    #[serde(default)]
    pub message: Option<String>,
    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed inbound state-sync event
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// Full node snapshot
    InitialState(Vec<NodeStateEntry>),
    /// One node changed
    NodeState(NodeStateEntry),
    /// Full link snapshot
    InitialLinks(Vec<LinkStateEntry>),
    /// One link changed
    LinkState(LinkStateEntry),
    /// Lab state changed
    LabState(LabState),
    /// Job progress report
    JobProgress(JobProgress),
    /// Liveness only: `ping`, `pong` or `heartbeat`
    Liveness(EventKind),
}

/// Snapshot payloads arrive either wrapped (`{"nodes": [...]}`) or bare
#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot<T> {
    Nodes { nodes: Vec<T> },
    Links { links: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Snapshot<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Snapshot::Nodes { nodes } => nodes,
            Snapshot::Links { links } => links,
            Snapshot::Bare(items) => items,
        }
    }
}

impl StateEvent {
    /// Decode a text frame into a typed event
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(Envelope::decode(text)?)
    }

    /// Interpret an envelope
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let kind = EventKind::from_name(&envelope.kind)
            .ok_or_else(|| ProtocolError::UnknownEventType(envelope.kind.clone()))?;

        let event = match kind {
            EventKind::InitialState => {
                let snapshot: Snapshot<NodeStateEntry> = data(kind, envelope.data)?;
                StateEvent::InitialState(snapshot.into_vec())
            }
            EventKind::NodeState => StateEvent::NodeState(data(kind, envelope.data)?),
            EventKind::InitialLinks => {
                let snapshot: Snapshot<LinkStateEntry> = data(kind, envelope.data)?;
                StateEvent::InitialLinks(snapshot.into_vec())
            }
            EventKind::LinkState => StateEvent::LinkState(data(kind, envelope.data)?),
            EventKind::LabState => StateEvent::LabState(data(kind, envelope.data)?),
            EventKind::JobProgress => StateEvent::JobProgress(data(kind, envelope.data)?),
            EventKind::Ping | EventKind::Pong | EventKind::Heartbeat => StateEvent::Liveness(kind),
            // Only ever sent by clients
            EventKind::Refresh => {
                return Err(ProtocolError::UnknownEventType(envelope.kind));
            }
        };

        Ok(event)
    }

    /// Wire kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            StateEvent::InitialState(_) => EventKind::InitialState,
            StateEvent::NodeState(_) => EventKind::NodeState,
            StateEvent::InitialLinks(_) => EventKind::InitialLinks,
            StateEvent::LinkState(_) => EventKind::LinkState,
            StateEvent::LabState(_) => EventKind::LabState,
            StateEvent::JobProgress(_) => EventKind::JobProgress,
            StateEvent::Liveness(kind) => *kind,
        }
    }
}

fn data<T: serde::de::DeserializeOwned>(
    kind: EventKind,
    data: Option<Value>,
) -> Result<T, ProtocolError> {
    let value = data.ok_or(ProtocolError::MissingData(kind.as_str()))?;
    Ok(serde_json::from_value(value)?)
}

/// Outbound client frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFrame {
    /// Keepalive
    Ping,
    /// Ask the orchestrator to resend snapshots
    Refresh,
}

impl ClientFrame {
    /// Wrap this frame in an envelope stamped with `timestamp`
    pub fn envelope(&self, timestamp: impl Into<String>) -> Envelope {
        let kind = match self {
            ClientFrame::Ping => EventKind::Ping,
            ClientFrame::Refresh => EventKind::Refresh,
        };
        Envelope {
            kind: kind.as_str().to_string(),
            timestamp: timestamp.into(),
            data: None,
        }
    }

    /// Encode as a text frame
    pub fn encode(&self, timestamp: impl Into<String>) -> Result<String, ProtocolError> {
        self.envelope(timestamp).encode()
    }
}
