//! lc-protocol: Wire formats for the lab console runtime
//!
//! This crate defines what travels over the two long-lived sockets a lab
//! view keeps open against the orchestrator:
//!
//! - the per-node console socket, an opaque terminal byte stream with
//!   in-band JSON control frames, and
//! - the per-lab state-sync socket, a stream of typed JSON envelopes.
//!
//! It also builds the endpoint URLs for both. Nothing here performs I/O.

pub mod control;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod ids;

pub use control::{ConsoleInbound, ConsoleMode, ControlFrame, CONTROL_FRAME_TYPE};
pub use endpoint::{console_url, state_sync_url, Origin};
pub use envelope::{
    ClientFrame, Envelope, EventKind, JobProgress, LabState, LinkStateEntry, NodeStateEntry,
    StateEvent,
};
pub use error::ProtocolError;
pub use ids::{LabId, NodeId};
