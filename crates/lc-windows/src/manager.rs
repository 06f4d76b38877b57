//! Window manager
//!
//! Owns every floating [`ConsoleWindow`], the stacking order and the active
//! pointer gesture.
//!
//! # Pointer flow
//!
//! 1. `pointer_down_*` starts a gesture, raises the window and emits
//!    [`WmEvent::PointerCaptureAcquired`]
//! 2. [`WindowManager::pointer_move`] only records the pointer; it returns
//!    `true` when the host should request an animation frame
//! 3. [`WindowManager::animation_frame`] applies the latest pointer to the
//!    live overlay (position, size, merge target, dock band, tab mode)
//! 4. [`WindowManager::pointer_up`] commits the result into the windows and
//!    emits [`WmEvent::PointerCaptureReleased`]
//!
//! Committed geometry is only written on release, so a cancelled gesture
//! leaves no trace.

use std::collections::BTreeMap;

use crate::geometry::{
    clamp_position, clamp_size, in_dock_band, Point, Rect, Size, CASCADE_OFFSET,
    DEFAULT_WINDOW_SIZE, VIEWPORT_MARGIN,
};
use crate::gesture::{DragState, Gesture, ResizeState, TabDragMode, TabDragState};
use crate::view::{DrawPlan, SplitGhost, WindowView, WmEvent, BASE_Z_INDEX};
use crate::window::{ConsoleWindow, TabId, WindowId};

/// Cascade positions cycle after this many windows
const CASCADE_STEPS: u64 = 8;

/// Where a split-off window's origin sits relative to the drop point
const SPLIT_ANCHOR: Point = Point::new(48.0, 16.0);

/// Floating console windows with tabs
#[derive(Debug, Default)]
pub struct WindowManager {
    windows: BTreeMap<WindowId, ConsoleWindow>,
    /// Stacking order, bottom first
    z_order: Vec<WindowId>,
    viewport: Option<Size>,
    gesture: Gesture,
    pending_pointer: Option<Point>,
    frame_requested: bool,
    next_id: u64,
    cascade: u64,
    events: Vec<WmEvent>,
}

impl WindowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the viewport size; `None` while it is not yet known
    ///
    /// Committed windows are pulled back inside the new viewport.
    pub fn set_viewport(&mut self, viewport: Option<Size>) {
        self.viewport = viewport;
        if viewport.is_none() {
            return;
        }
        for window in self.windows.values_mut() {
            let position = clamp_position(window.position(), window.effective_size(), viewport);
            window.set_position(position);
        }
    }

    pub fn viewport(&self) -> Option<Size> {
        self.viewport
    }

    pub fn window(&self, id: WindowId) -> Option<&ConsoleWindow> {
        self.windows.get(&id)
    }

    /// Windows bottom to top
    pub fn windows(&self) -> impl Iterator<Item = &ConsoleWindow> {
        self.z_order.iter().filter_map(|id| self.windows.get(id))
    }

    /// Stacking order, bottom first
    pub fn z_order(&self) -> &[WindowId] {
        &self.z_order
    }

    /// Topmost window
    pub fn focused(&self) -> Option<WindowId> {
        self.z_order.last().copied()
    }

    /// Window currently holding `tab`
    pub fn window_of(&self, tab: &TabId) -> Option<WindowId> {
        self.windows
            .values()
            .find(|window| window.contains_tab(tab))
            .map(ConsoleWindow::id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// The active gesture
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    /// Drain pending host notifications
    pub fn take_events(&mut self) -> Vec<WmEvent> {
        std::mem::take(&mut self.events)
    }

    /// Raise `id` to the top of the stacking order
    pub fn focus(&mut self, id: WindowId) -> bool {
        let Some(index) = self.z_order.iter().position(|w| *w == id) else {
            return false;
        };
        let id = self.z_order.remove(index);
        self.z_order.push(id);
        true
    }

    /// Show the console for `tab`
    ///
    /// An already open tab is activated and its window raised. Otherwise
    /// the tab joins the topmost window, or a new window when there is none.
    pub fn open_console(&mut self, tab: TabId) -> WindowId {
        if let Some(id) = self.window_of(&tab) {
            self.activate_tab(&tab);
            return id;
        }

        let Some(id) = self.focused() else {
            let id = self.insert_window(vec![tab.clone()], None);
            self.events.push(WmEvent::ConsoleOpened { window: id, tab });
            return id;
        };

        if let Some(window) = self.windows.get_mut(&id) {
            window.push_tab(tab.clone());
            window.set_minimized(false);
        }
        tracing::debug!(window = %id, tab = %tab, "Console added to window");
        self.events.push(WmEvent::ConsoleOpened { window: id, tab });
        id
    }

    /// Open a new window holding `tabs`
    ///
    /// Tabs already shown elsewhere are skipped. Returns `None` when nothing
    /// is left to show. Without a `position` the window cascades from the
    /// previous one.
    pub fn open_window(&mut self, tabs: Vec<TabId>, position: Option<Point>) -> Option<WindowId> {
        let mut fresh: Vec<TabId> = Vec::with_capacity(tabs.len());
        for tab in tabs {
            if self.window_of(&tab).is_none() && !fresh.contains(&tab) {
                fresh.push(tab);
            }
        }
        if fresh.is_empty() {
            return None;
        }

        let id = self.insert_window(fresh.clone(), position);
        for tab in fresh {
            self.events.push(WmEvent::ConsoleOpened { window: id, tab });
        }
        Some(id)
    }

    fn insert_window(&mut self, tabs: Vec<TabId>, position: Option<Point>) -> WindowId {
        self.next_id += 1;
        let id = WindowId(self.next_id);

        let position = position.unwrap_or_else(|| self.next_cascade());
        let position = clamp_position(position, DEFAULT_WINDOW_SIZE, self.viewport);

        tracing::debug!(window = %id, tabs = tabs.len(), "Opening console window");
        self.windows
            .insert(id, ConsoleWindow::new(id, tabs, position, DEFAULT_WINDOW_SIZE));
        self.z_order.push(id);
        id
    }

    fn next_cascade(&mut self) -> Point {
        let step = (self.cascade % CASCADE_STEPS) as f64;
        self.cascade += 1;
        let offset = VIEWPORT_MARGIN + CASCADE_OFFSET * (step + 1.0);
        Point::new(offset, offset)
    }

    /// Make `tab` active and raise its window
    pub fn activate_tab(&mut self, tab: &TabId) -> bool {
        let Some(id) = self.window_of(tab) else {
            return false;
        };
        if let Some(window) = self.windows.get_mut(&id) {
            window.activate(tab);
        }
        self.focus(id);
        true
    }

    /// Close one tab; a window left empty is removed
    pub fn close_tab(&mut self, tab: &TabId) -> bool {
        let Some(id) = self.window_of(tab) else {
            return false;
        };
        if matches!(&self.gesture, Gesture::TabDrag(drag) if drag.tab == *tab) {
            self.abort_gesture();
        }

        let now_empty = match self.windows.get_mut(&id) {
            Some(window) => {
                window.remove_tab(tab);
                window.tab_count() == 0
            }
            None => return false,
        };

        tracing::debug!(window = %id, tab = %tab, "Console tab closed");
        self.events.push(WmEvent::ConsoleClosed {
            window: id,
            tab: tab.clone(),
        });

        if now_empty {
            self.remove_window(id);
        }
        true
    }

    /// Close a window and every tab in it
    pub fn close_window(&mut self, id: WindowId) -> bool {
        let Some(mut window) = self.remove_window(id) else {
            return false;
        };
        let (tabs, _) = window.drain_tabs();
        tracing::debug!(window = %id, tabs = tabs.len(), "Console window closed");
        for tab in tabs {
            self.events.push(WmEvent::ConsoleClosed { window: id, tab });
        }
        true
    }

    /// Collapse to a header strip, or expand again
    ///
    /// Tabs and their sessions are untouched.
    pub fn toggle_minimize(&mut self, id: WindowId) -> bool {
        let viewport = self.viewport;
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        window.set_minimized(!window.is_minimized());
        let position = clamp_position(window.position(), window.effective_size(), viewport);
        window.set_position(position);
        true
    }

    /// Hand a window over to the bottom panel
    ///
    /// The window leaves the floating set for good; its tabs travel with
    /// the [`WmEvent::Docked`] notification.
    pub fn dock(&mut self, id: WindowId) -> bool {
        let Some(mut window) = self.remove_window(id) else {
            return false;
        };
        let (tabs, _) = window.drain_tabs();
        tracing::info!(window = %id, tabs = tabs.len(), "Window docked");
        self.events.push(WmEvent::Docked { window: id, tabs });
        true
    }

    fn remove_window(&mut self, id: WindowId) -> Option<ConsoleWindow> {
        if self.gesture.window() == Some(id) {
            self.abort_gesture();
        }
        let window = self.windows.remove(&id)?;
        self.z_order.retain(|w| *w != id);
        Some(window)
    }

    /// Any pointer-down inside a window raises it
    pub fn pointer_down_window(&mut self, id: WindowId) -> bool {
        self.focus(id)
    }

    /// Start dragging a window by its header
    pub fn pointer_down_header(&mut self, id: WindowId, pointer: Point) -> bool {
        if self.gesture.is_active() {
            return false;
        }
        let Some(window) = self.windows.get(&id) else {
            return false;
        };

        let drag = DragState {
            window: id,
            offset: pointer.offset_from(window.position()),
            pointer,
            merge_target: None,
            dock_armed: false,
        };
        self.focus(id);
        self.begin_gesture(Gesture::WindowDrag(drag));
        true
    }

    /// Start resizing a window from its corner handle
    ///
    /// Minimized windows cannot be resized.
    pub fn pointer_down_resize_handle(&mut self, id: WindowId, pointer: Point) -> bool {
        if self.gesture.is_active() {
            return false;
        }
        let Some(window) = self.windows.get(&id) else {
            return false;
        };
        if window.is_minimized() {
            return false;
        }

        let resize = ResizeState {
            window: id,
            start_size: window.size(),
            start_pointer: pointer,
            size: window.size(),
        };
        self.focus(id);
        self.begin_gesture(Gesture::WindowResize(resize));
        true
    }

    /// Pointer-down on a tab: activate it and, if the window has siblings,
    /// start a tab drag
    ///
    /// `tab_bounds` are the on-screen rectangles of the window's tabs in
    /// display order. Returns whether a drag started.
    pub fn pointer_down_tab(
        &mut self,
        id: WindowId,
        tab: &TabId,
        pointer: Point,
        tab_bounds: &[Rect],
    ) -> bool {
        if self.gesture.is_active() {
            return false;
        }
        let Some(window) = self.windows.get_mut(&id) else {
            return false;
        };
        if !window.activate(tab) {
            return false;
        }

        let draggable = window.tab_count() > 1;
        let sibling_midpoints: Vec<f64> = window
            .tabs()
            .iter()
            .zip(tab_bounds)
            .filter(|(t, _)| *t != tab)
            .map(|(_, bounds)| bounds.mid_x())
            .collect();

        self.focus(id);
        if !draggable {
            return false;
        }

        let drag = TabDragState::new(id, tab.clone(), pointer, sibling_midpoints);
        self.begin_gesture(Gesture::TabDrag(drag));
        true
    }

    /// Record the pointer during a gesture
    ///
    /// Returns `true` when the host should schedule an
    /// [`animation_frame`](Self::animation_frame); moves between frames
    /// coalesce into the latest position.
    pub fn pointer_move(&mut self, pointer: Point) -> bool {
        if !self.gesture.is_active() {
            return false;
        }
        self.pending_pointer = Some(pointer);
        if self.frame_requested {
            return false;
        }
        self.frame_requested = true;
        true
    }

    /// Apply the latest recorded pointer to the live overlay
    pub fn animation_frame(&mut self) {
        self.frame_requested = false;
        let Some(pointer) = self.pending_pointer.take() else {
            return;
        };

        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::WindowDrag(drag) => {
                drag.pointer = pointer;
                drag.merge_target = topmost_at(&self.windows, &self.z_order, pointer, drag.window);
                drag.dock_armed = in_dock_band(pointer, self.viewport);
            }
            Gesture::WindowResize(resize) => {
                let Some(window) = self.windows.get(&resize.window) else {
                    return;
                };
                let delta = pointer.offset_from(resize.start_pointer);
                let wanted = Size::new(
                    resize.start_size.width + delta.x,
                    resize.start_size.height + delta.y,
                );
                resize.size = clamp_size(wanted, window.position(), self.viewport);
            }
            Gesture::TabDrag(drag) => drag.update(pointer),
        }
    }

    /// Finish the gesture at `pointer` and commit its result
    pub fn pointer_up(&mut self, pointer: Point) {
        if !self.gesture.is_active() {
            return;
        }
        self.pending_pointer = Some(pointer);
        self.animation_frame();

        let gesture = std::mem::take(&mut self.gesture);
        let Some(window) = gesture.window() else {
            return;
        };

        match gesture {
            Gesture::Idle => {}
            Gesture::WindowDrag(drag) => self.commit_drag(drag),
            Gesture::WindowResize(resize) => {
                if let Some(target) = self.windows.get_mut(&resize.window) {
                    target.set_size(resize.size);
                }
            }
            Gesture::TabDrag(drag) => self.commit_tab_drag(drag),
        }

        self.events.push(WmEvent::PointerCaptureReleased { window });
    }

    /// Abandon the gesture without committing anything
    pub fn pointer_cancel(&mut self) {
        self.abort_gesture();
    }

    fn begin_gesture(&mut self, gesture: Gesture) {
        if let Some(window) = gesture.window() {
            self.events.push(WmEvent::PointerCaptureAcquired { window });
        }
        self.gesture = gesture;
        self.pending_pointer = None;
        self.frame_requested = false;
    }

    fn abort_gesture(&mut self) {
        let gesture = std::mem::take(&mut self.gesture);
        self.pending_pointer = None;
        self.frame_requested = false;
        if let Some(window) = gesture.window() {
            self.events.push(WmEvent::PointerCaptureReleased { window });
        }
    }

    fn commit_drag(&mut self, drag: DragState) {
        if drag.dock_armed {
            self.dock(drag.window);
            return;
        }
        if let Some(target) = drag.merge_target {
            self.merge(drag.window, target);
            return;
        }

        let viewport = self.viewport;
        if let Some(window) = self.windows.get_mut(&drag.window) {
            let position = clamp_position(drag.position(), window.effective_size(), viewport);
            window.set_position(position);
        }
    }

    /// Move every tab of `source` into `target` and drop `source`
    fn merge(&mut self, source: WindowId, target: WindowId) {
        if source == target || !self.windows.contains_key(&target) {
            return;
        }
        let Some(mut dragged) = self.remove_window(source) else {
            return;
        };
        let (tabs, active) = dragged.drain_tabs();

        if let Some(window) = self.windows.get_mut(&target) {
            tracing::debug!(from = %source, into = %target, tabs = tabs.len(), "Merging windows");
            for tab in tabs {
                window.push_tab(tab);
            }
            if let Some(active) = active {
                window.activate(&active);
            }
            window.set_minimized(false);
        }
        self.focus(target);
    }

    fn commit_tab_drag(&mut self, drag: TabDragState) {
        match drag.mode {
            TabDragMode::Undetermined => {}
            TabDragMode::Reordering { target } => {
                if let Some(window) = self.windows.get_mut(&drag.window) {
                    if window.move_tab(&drag.tab, target) {
                        tracing::debug!(window = %drag.window, tab = %drag.tab, target, "Tab reordered");
                    }
                }
            }
            TabDragMode::Splitting => self.split(drag.window, &drag.tab, drag.current),
        }
    }

    /// Move `tab` out of `source` into a new window near `drop`
    fn split(&mut self, source: WindowId, tab: &TabId, drop: Point) {
        let Some(window) = self.windows.get_mut(&source) else {
            return;
        };
        // The last tab of a window cannot be split off
        if window.tab_count() < 2 || !window.remove_tab(tab) {
            return;
        }

        let position = drop.offset_from(SPLIT_ANCHOR);
        let id = self.insert_window(vec![tab.clone()], Some(position));
        tracing::debug!(from = %source, into = %id, tab = %tab, "Tab split into new window");
    }

    /// Committed geometry merged with the live overlay, bottom to top
    pub fn render(&self) -> DrawPlan {
        let mut plan = DrawPlan::default();

        for (index, id) in self.z_order.iter().enumerate() {
            let Some(window) = self.windows.get(id) else {
                continue;
            };

            let mut view = WindowView {
                id: *id,
                tabs: window.tabs().to_vec(),
                active_tab: window.active_tab().cloned(),
                position: window.position(),
                size: window.effective_size(),
                minimized: window.is_minimized(),
                z_index: BASE_Z_INDEX + index as u32,
                focused: index + 1 == self.z_order.len(),
                merge_target: false,
                reorder: None,
            };

            match &self.gesture {
                Gesture::WindowDrag(drag) if drag.window == *id => {
                    view.position = drag.position();
                }
                Gesture::WindowDrag(drag) if drag.merge_target == Some(*id) => {
                    view.merge_target = true;
                }
                Gesture::WindowResize(resize) if resize.window == *id => {
                    view.size = resize.size;
                }
                Gesture::TabDrag(drag) if drag.window == *id => {
                    if let TabDragMode::Reordering { target } = drag.mode {
                        view.reorder = Some((drag.tab.clone(), target));
                    }
                }
                _ => {}
            }

            plan.windows.push(view);
        }

        match &self.gesture {
            Gesture::WindowDrag(drag) => plan.dock_indicator = drag.dock_armed,
            Gesture::TabDrag(drag) if drag.mode == TabDragMode::Splitting => {
                plan.split_ghost = Some(SplitGhost {
                    tab: drag.tab.clone(),
                    position: drag.current,
                });
            }
            _ => {}
        }

        plan
    }
}

/// Topmost window other than `exclude` whose bounds contain `pointer`
fn topmost_at(
    windows: &BTreeMap<WindowId, ConsoleWindow>,
    z_order: &[WindowId],
    pointer: Point,
    exclude: WindowId,
) -> Option<WindowId> {
    z_order
        .iter()
        .rev()
        .filter(|id| **id != exclude)
        .find(|id| {
            windows
                .get(id)
                .map_or(false, |window| window.bounds().contains(pointer))
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(name: &str) -> TabId {
        TabId::from(name)
    }

    #[test]
    fn test_open_console_reuses_topmost_window() {
        let mut wm = WindowManager::new();
        let first = wm.open_console(tab("lab/r1"));
        let second = wm.open_console(tab("lab/r2"));

        assert_eq!(first, second);
        assert_eq!(wm.len(), 1);
        assert_eq!(wm.window(first).unwrap().active_tab(), Some(&tab("lab/r2")));
    }

    #[test]
    fn test_open_console_existing_tab_activates() {
        let mut wm = WindowManager::new();
        let a = wm.open_window(vec![tab("r1"), tab("r2")], None).unwrap();
        let b = wm.open_window(vec![tab("r3")], None).unwrap();
        wm.take_events();

        assert_eq!(wm.open_console(tab("r1")), a);
        assert_eq!(wm.focused(), Some(a));
        assert_eq!(wm.window(a).unwrap().active_tab(), Some(&tab("r1")));
        assert!(wm.take_events().is_empty());
        assert_eq!(wm.z_order(), &[b, a]);
    }

    #[test]
    fn test_open_window_skips_tabs_open_elsewhere() {
        let mut wm = WindowManager::new();
        wm.open_window(vec![tab("r1")], None);
        assert_eq!(wm.open_window(vec![tab("r1")], None), None);

        let id = wm.open_window(vec![tab("r1"), tab("r2"), tab("r2")], None).unwrap();
        assert_eq!(wm.window(id).unwrap().tabs(), &[tab("r2")]);
    }

    #[test]
    fn test_cascade_positions() {
        let mut wm = WindowManager::new();
        let a = wm.open_window(vec![tab("r1")], None).unwrap();
        let b = wm.open_window(vec![tab("r2")], None).unwrap();
        let pa = wm.window(a).unwrap().position();
        let pb = wm.window(b).unwrap().position();
        assert_eq!(pb.x - pa.x, CASCADE_OFFSET);
        assert_eq!(pb.y - pa.y, CASCADE_OFFSET);
    }

    #[test]
    fn test_pointer_move_coalesces_frames() {
        let mut wm = WindowManager::new();
        let id = wm.open_window(vec![tab("r1")], Some(Point::new(100.0, 100.0))).unwrap();

        assert!(!wm.pointer_move(Point::new(1.0, 1.0)));
        assert!(wm.pointer_down_header(id, Point::new(120.0, 110.0)));
        assert!(wm.pointer_move(Point::new(130.0, 110.0)));
        assert!(!wm.pointer_move(Point::new(140.0, 110.0)));

        wm.animation_frame();
        assert_eq!(
            wm.render().window(id).unwrap().position,
            Point::new(120.0, 100.0)
        );
        // Committed geometry is untouched until release
        assert_eq!(wm.window(id).unwrap().position(), Point::new(100.0, 100.0));
        assert!(wm.pointer_move(Point::new(150.0, 110.0)));
    }

    #[test]
    fn test_only_one_gesture_at_a_time() {
        let mut wm = WindowManager::new();
        let id = wm.open_window(vec![tab("r1")], None).unwrap();
        assert!(wm.pointer_down_header(id, Point::new(50.0, 50.0)));
        assert!(!wm.pointer_down_resize_handle(id, Point::new(700.0, 400.0)));
        assert!(matches!(wm.gesture(), Gesture::WindowDrag(_)));
    }

    #[test]
    fn test_cancel_discards_live_overlay() {
        let mut wm = WindowManager::new();
        let id = wm.open_window(vec![tab("r1")], Some(Point::new(100.0, 100.0))).unwrap();
        wm.pointer_down_header(id, Point::new(110.0, 110.0));
        wm.pointer_move(Point::new(400.0, 400.0));
        wm.animation_frame();
        wm.pointer_cancel();

        assert!(!wm.gesture().is_active());
        assert_eq!(wm.render().window(id).unwrap().position, Point::new(100.0, 100.0));
        assert_eq!(
            wm.take_events().last(),
            Some(&WmEvent::PointerCaptureReleased { window: id })
        );
    }

    #[test]
    fn test_topmost_at_prefers_higher_window() {
        let mut wm = WindowManager::new();
        let low = wm.open_window(vec![tab("r1")], Some(Point::new(0.0, 0.0))).unwrap();
        let high = wm.open_window(vec![tab("r2")], Some(Point::new(50.0, 50.0))).unwrap();
        let dragged = wm.open_window(vec![tab("r3")], Some(Point::new(900.0, 900.0))).unwrap();

        let hit = topmost_at(&wm.windows, &wm.z_order, Point::new(100.0, 100.0), dragged);
        assert_eq!(hit, Some(high));

        wm.focus(low);
        let hit = topmost_at(&wm.windows, &wm.z_order, Point::new(100.0, 100.0), dragged);
        assert_eq!(hit, Some(low));
    }
}
