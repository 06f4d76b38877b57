//! lc-runtime: Real-time client runtime for the lab console
//!
//! Keeps a client synchronized with the orchestrator over long-lived
//! sockets:
//!
//! - [`ConsoleTransport`]: one socket per open device console, carrying
//!   terminal bytes plus in-band control frames
//! - [`TerminalSurface`]: a console transport bound to a terminal widget,
//!   with interactivity gating, a boot-readiness overlay and re-keying
//! - [`StateSyncTransport`]: one socket per lab, carrying typed node, link,
//!   lab and job events into a [`StateStore`]
//! - [`ConsoleSessions`]: terminal surfaces opened and closed as console
//!   window tabs come and go
//!
//! Both transports reconnect with exponential backoff ([`ReconnectState`])
//! and never surface socket errors to the caller; failures become phase
//! changes on a `watch` channel.

pub mod console;
pub mod context;
pub mod reconnect;
pub mod sessions;
pub mod state_sync;
pub mod store;
pub mod surface;
pub mod ws;

pub use console::{ConsoleInput, ConsoleModeState, ConsoleTarget, ConsoleTransport, DISCONNECT_NOTICE};
pub use context::ConnectionContext;
pub use reconnect::ReconnectState;
pub use sessions::ConsoleSessions;
pub use state_sync::{StateSyncTransport, DEFAULT_PING_INTERVAL};
pub use store::StateStore;
pub use surface::{ReadinessGate, TerminalSurface};
pub use ws::{WsConnector, DEFAULT_CONNECT_TIMEOUT};
