//! Console windows and their tabs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size, COMPACT_SIZE};

/// Identifier of a floating console window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Identifier of a device session shown as a tab
///
/// Typically `lab/node`; the window model treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TabId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A floating panel holding one or more console tabs
///
/// The active tab, when set, is always one of `tabs`. Only the
/// [`WindowManager`](crate::WindowManager) mutates windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleWindow {
    id: WindowId,
    tabs: Vec<TabId>,
    active_tab: Option<TabId>,
    position: Point,
    size: Size,
    minimized: bool,
}

impl ConsoleWindow {
    pub(crate) fn new(id: WindowId, tabs: Vec<TabId>, position: Point, size: Size) -> Self {
        let active_tab = tabs.first().cloned();
        Self {
            id,
            tabs,
            active_tab,
            position,
            size,
            minimized: false,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Tabs in display order
    pub fn tabs(&self) -> &[TabId] {
        &self.tabs
    }

    pub fn active_tab(&self) -> Option<&TabId> {
        self.active_tab.as_ref()
    }

    /// Committed top-left corner
    pub fn position(&self) -> Point {
        self.position
    }

    /// Committed expanded size; see [`effective_size`](Self::effective_size)
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// Size on screen: compact while minimized
    pub fn effective_size(&self) -> Size {
        if self.minimized {
            COMPACT_SIZE
        } else {
            self.size
        }
    }

    /// Committed bounds on screen
    pub fn bounds(&self) -> Rect {
        Rect::new(self.position, self.effective_size())
    }

    pub fn contains_tab(&self, tab: &TabId) -> bool {
        self.tabs.contains(tab)
    }

    pub fn tab_index(&self, tab: &TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t == tab)
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub(crate) fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    pub(crate) fn set_minimized(&mut self, minimized: bool) {
        self.minimized = minimized;
    }

    /// Make `tab` active; ignored unless it belongs here
    pub(crate) fn activate(&mut self, tab: &TabId) -> bool {
        if !self.contains_tab(tab) {
            return false;
        }
        self.active_tab = Some(tab.clone());
        true
    }

    /// Append `tab` and make it active
    pub(crate) fn push_tab(&mut self, tab: TabId) {
        if !self.contains_tab(&tab) {
            self.tabs.push(tab.clone());
        }
        self.active_tab = Some(tab);
    }

    /// Remove `tab`, moving the active tab to a neighbour if needed
    pub(crate) fn remove_tab(&mut self, tab: &TabId) -> bool {
        let Some(index) = self.tab_index(tab) else {
            return false;
        };
        self.tabs.remove(index);

        if self.active_tab.as_ref() == Some(tab) {
            let next = index.min(self.tabs.len().saturating_sub(1));
            self.active_tab = self.tabs.get(next).cloned();
        }
        true
    }

    /// Move `tab` to `index` in the list with `tab` taken out
    pub(crate) fn move_tab(&mut self, tab: &TabId, index: usize) -> bool {
        let Some(current) = self.tab_index(tab) else {
            return false;
        };
        if current == index {
            return false;
        }
        let tab = self.tabs.remove(current);
        let index = index.min(self.tabs.len());
        self.tabs.insert(index, tab);
        true
    }

    /// Take every tab out, leaving the window empty
    pub(crate) fn drain_tabs(&mut self) -> (Vec<TabId>, Option<TabId>) {
        let active = self.active_tab.take();
        (std::mem::take(&mut self.tabs), active)
    }
}
