//! Terminal widget traits

use std::sync::Arc;

use bytes::Bytes;
use lc_protocol::{LabId, NodeId};

/// Callback receiving keystrokes typed into a terminal widget
pub type InputHandler = Box<dyn Fn(Bytes) + Send + Sync>;

/// The terminal emulator a console renders into
///
/// Methods take `&self`; implementations use interior mutability the way a
/// UI widget handle would.
pub trait TerminalWidget: Send + Sync {
    /// Render raw device output
    fn write(&self, data: &[u8]);

    /// Register the keystroke handler, replacing any previous one
    fn on_data(&self, handler: InputHandler);

    /// Give the widget keyboard focus
    fn focus(&self);

    /// Resize the widget to its container
    fn fit(&self);

    /// Release the widget; no further calls follow
    fn dispose(&self);
}

/// Creates a fresh terminal widget per console identity
pub trait TerminalFactory: Send + Sync {
    /// Create the widget for `node` in `lab`
    fn create(&self, lab: &LabId, node: &NodeId) -> Arc<dyn TerminalWidget>;
}
