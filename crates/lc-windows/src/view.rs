//! Render output and host notifications

use serde::Serialize;

use crate::geometry::{Point, Size};
use crate::window::{TabId, WindowId};

/// z-index of the bottom-most window
pub const BASE_Z_INDEX: u32 = 100;

/// Everything the host needs to draw one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawPlan {
    /// Windows bottom to top
    pub windows: Vec<WindowView>,
    /// A dragged window would dock if released now
    pub dock_indicator: bool,
    /// Ghost following the pointer while a tab is torn off
    pub split_ghost: Option<SplitGhost>,
}

impl DrawPlan {
    pub fn window(&self, id: WindowId) -> Option<&WindowView> {
        self.windows.iter().find(|view| view.id == id)
    }
}

/// One window with committed geometry and live overlay merged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowView {
    pub id: WindowId,
    pub tabs: Vec<TabId>,
    pub active_tab: Option<TabId>,
    pub position: Point,
    pub size: Size,
    pub minimized: bool,
    pub z_index: u32,
    /// Top of the stacking order
    pub focused: bool,
    /// Dropping the dragged window now would merge into this one
    pub merge_target: bool,
    /// Tab being reordered within this window and its insertion index
    pub reorder: Option<(TabId, usize)>,
}

/// Preview of a tab being split into its own window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitGhost {
    pub tab: TabId,
    pub position: Point,
}

/// Notification for the host, drained with
/// [`WindowManager::take_events`](crate::WindowManager::take_events)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WmEvent {
    /// A console session gained a tab
    ConsoleOpened { window: WindowId, tab: TabId },
    /// A console tab was closed; its session should be torn down
    ConsoleClosed { window: WindowId, tab: TabId },
    /// A window left the floating set for the bottom panel
    Docked { window: WindowId, tabs: Vec<TabId> },
    /// A gesture started; route all pointer events to the manager
    PointerCaptureAcquired { window: WindowId },
    /// The gesture ended; release the global pointer listeners
    PointerCaptureReleased { window: WindowId },
}
