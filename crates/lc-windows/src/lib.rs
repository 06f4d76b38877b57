//! lc-windows: Floating console windows for the lab console
//!
//! A headless model of tabbed console windows: the host feeds it pointer
//! events and viewport size, draws the [`DrawPlan`] it returns and reacts to
//! the [`WmEvent`]s it emits. No rendering or DOM access happens here.
//!
//! Each tab belongs to exactly one window at a time, which is what keeps
//! merging and splitting from ever duplicating a console session.

pub mod geometry;
pub mod gesture;
pub mod manager;
pub mod view;
pub mod window;

pub use geometry::{Point, Rect, Size};
pub use gesture::{Gesture, TabDragMode};
pub use manager::WindowManager;
pub use view::{DrawPlan, SplitGhost, WindowView, WmEvent};
pub use window::{ConsoleWindow, TabId, WindowId};
