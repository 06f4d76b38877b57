//! Pointer gesture state
//!
//! At most one gesture is active at a time. Its state doubles as the live
//! overlay: while a window is dragged or resized, the committed window is
//! untouched and the renderer reads the in-progress geometry from here.

use crate::geometry::{Point, Size};
use crate::window::{TabId, WindowId};

/// Vertical travel that turns a tab drag into a split
pub const SPLIT_THRESHOLD: f64 = 36.0;

/// Horizontal travel that turns a tab drag into a reorder
pub const REORDER_THRESHOLD: f64 = 6.0;

/// A window being moved by its header
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub window: WindowId,
    /// Pointer position relative to the window origin at pointer-down
    pub offset: Point,
    pub pointer: Point,
    /// Topmost other window under the pointer
    pub merge_target: Option<WindowId>,
    /// Pointer is inside the dock band
    pub dock_armed: bool,
}

impl DragState {
    /// Live window origin
    pub fn position(&self) -> Point {
        self.pointer.offset_from(self.offset)
    }
}

/// A window being resized from its corner handle
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeState {
    pub window: WindowId,
    pub start_size: Size,
    pub start_pointer: Point,
    /// Live, already clamped size
    pub size: Size,
}

/// What a tab drag resolved into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabDragMode {
    /// Neither threshold crossed yet
    Undetermined,
    /// Moving within the tab strip; `target` is the insertion index among
    /// the other tabs
    Reordering { target: usize },
    /// Tearing the tab off into a new window
    Splitting,
}

/// A tab being dragged out of or along its tab strip
#[derive(Debug, Clone, PartialEq)]
pub struct TabDragState {
    pub window: WindowId,
    pub tab: TabId,
    pub start: Point,
    pub current: Point,
    pub mode: TabDragMode,
    /// Horizontal midpoints of the other tabs, in order
    sibling_midpoints: Vec<f64>,
}

impl TabDragState {
    pub(crate) fn new(
        window: WindowId,
        tab: TabId,
        start: Point,
        sibling_midpoints: Vec<f64>,
    ) -> Self {
        Self {
            window,
            tab,
            start,
            current: start,
            mode: TabDragMode::Undetermined,
            sibling_midpoints,
        }
    }

    /// Track the pointer, locking the mode once a threshold is crossed
    ///
    /// The split threshold is checked first; once locked the mode never
    /// changes for the rest of the drag.
    pub(crate) fn update(&mut self, pointer: Point) {
        self.current = pointer;
        let delta = pointer.offset_from(self.start);

        if self.mode == TabDragMode::Undetermined {
            if delta.y.abs() > SPLIT_THRESHOLD {
                self.mode = TabDragMode::Splitting;
            } else if delta.x.abs() > REORDER_THRESHOLD {
                self.mode = TabDragMode::Reordering { target: 0 };
            }
        }

        if let TabDragMode::Reordering { target } = &mut self.mode {
            *target = reorder_target(&self.sibling_midpoints, pointer.x);
        }
    }
}

/// Insertion index for a dragged tab: how many sibling midpoints lie left
/// of the pointer
pub fn reorder_target(sibling_midpoints: &[f64], pointer_x: f64) -> usize {
    sibling_midpoints.iter().filter(|mid| **mid < pointer_x).count()
}

/// The active pointer gesture
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    WindowDrag(DragState),
    WindowResize(ResizeState),
    TabDrag(TabDragState),
}

impl Gesture {
    pub fn is_active(&self) -> bool {
        !matches!(self, Gesture::Idle)
    }

    /// Window the gesture operates on
    pub fn window(&self) -> Option<WindowId> {
        match self {
            Gesture::Idle => None,
            Gesture::WindowDrag(drag) => Some(drag.window),
            Gesture::WindowResize(resize) => Some(resize.window),
            Gesture::TabDrag(drag) => Some(drag.window),
        }
    }
}
