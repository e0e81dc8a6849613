//! Presentation tree
//!
//! The live shape of everything on screen. Each tab owns a root [`Frame`]:
//! a linear stack of pushed entries plus at most one overlay slot. An
//! overlay is a [`PresentationNode`] that owns its own `Frame`, so overlays
//! nest to arbitrary depth. Parents exclusively own their children;
//! presenting allocates a child, dismissing drops it.

use route_model::{PresentationStyle, Route, TabId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Stack Entries
// =============================================================================

/// A navigation stack entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    /// The route
    pub route: Route,
    /// Unique key for this entry
    pub key: String,
}

impl StackEntry {
    /// Create a new stack entry
    pub fn new(route: Route) -> Self {
        Self { route, key: uuid::Uuid::new_v4().to_string() }
    }
}

// =============================================================================
// Frames and Nodes
// =============================================================================

/// An overlay presented over a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationNode {
    /// Route at the root of the overlay
    pub route: Route,
    /// Style the overlay was presented with
    pub style: PresentationStyle,
    /// Unique key for this presentation
    pub key: String,
    /// The overlay's own stack and nested overlay
    pub frame: Frame,
}

impl PresentationNode {
    /// Create an overlay node with an empty frame
    pub fn new(route: Route, style: PresentationStyle) -> Self {
        Self { route, style, key: uuid::Uuid::new_v4().to_string(), frame: Frame::default() }
    }

    /// Route currently visible inside this overlay (top of its stack or its root)
    pub fn visible_route(&self) -> &Route {
        self.frame.stack.last().map(|e| &e.route).unwrap_or(&self.route)
    }
}

/// A stack of pushed routes with at most one overlay on top
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    stack: Vec<StackEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    overlay: Option<Box<PresentationNode>>,
}

impl Frame {
    /// Pushed entries, bottom to top
    pub fn stack(&self) -> &[StackEntry] {
        &self.stack
    }

    /// Routes on the stack, bottom to top
    pub fn routes(&self) -> Vec<&Route> {
        self.stack.iter().map(|e| &e.route).collect()
    }

    /// The overlay presented over this frame
    pub fn overlay(&self) -> Option<&PresentationNode> {
        self.overlay.as_deref()
    }

    /// Push a route
    pub fn push(&mut self, route: Route) {
        self.stack.push(StackEntry::new(route));
    }

    /// Pop the top route
    pub fn pop(&mut self) -> Option<StackEntry> {
        self.stack.pop()
    }

    /// Replace the top route (pushes when the stack is empty)
    pub fn replace_top(&mut self, route: Route) {
        match self.stack.last_mut() {
            Some(last) => *last = StackEntry::new(route),
            None => self.push(route),
        }
    }

    /// Remove every pushed route, leaving the overlay alone
    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Present an overlay, replacing any existing one
    pub fn present(&mut self, node: PresentationNode) {
        self.overlay = Some(Box::new(node));
    }

    /// Drop the overlay (and everything nested in it)
    pub fn dismiss_overlay(&mut self) -> Option<PresentationNode> {
        self.overlay.take().map(|node| *node)
    }

    /// Number of overlays nested over this frame
    pub fn overlay_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.overlay.as_deref();
        while let Some(node) = current {
            depth += 1;
            current = node.frame.overlay.as_deref();
        }
        depth
    }

    /// The overlay chain from outermost to innermost
    pub fn overlay_chain(&self) -> Vec<&PresentationNode> {
        let mut chain = Vec::new();
        let mut current = self.overlay.as_deref();
        while let Some(node) = current {
            chain.push(node);
            current = node.frame.overlay.as_deref();
        }
        chain
    }

    /// The innermost overlay node, if any
    pub fn innermost_overlay(&self) -> Option<&PresentationNode> {
        self.overlay_chain().pop()
    }

    /// The innermost frame (the deepest overlay's frame, or this one)
    pub fn innermost(&self) -> &Frame {
        match self.overlay {
            Some(ref node) => node.frame.innermost(),
            None => self,
        }
    }

    /// Mutable access to the innermost frame
    pub fn innermost_mut(&mut self) -> &mut Frame {
        match self.overlay {
            Some(ref mut node) => node.frame.innermost_mut(),
            None => self,
        }
    }

    /// The frame `depth` overlays down (0 is this frame)
    pub fn frame_at_mut(&mut self, depth: usize) -> Option<&mut Frame> {
        if depth == 0 {
            return Some(self);
        }
        match self.overlay {
            Some(ref mut node) => node.frame.frame_at_mut(depth - 1),
            None => None,
        }
    }

    /// Route currently visible in this frame, looking through overlays
    pub fn visible_route(&self) -> Option<&Route> {
        match self.innermost_overlay() {
            Some(node) => Some(node.visible_route()),
            None => self.stack.last().map(|e| &e.route),
        }
    }

    /// Pop `levels` overlays from the innermost outward; returns how many were popped
    pub fn dismiss_levels(&mut self, levels: usize) -> usize {
        let depth = self.overlay_depth();
        let popped = levels.min(depth);
        if popped == 0 {
            return 0;
        }
        if let Some(frame) = self.frame_at_mut(depth - popped) {
            frame.overlay = None;
        }
        popped
    }
}

// =============================================================================
// Tree
// =============================================================================

/// The whole presentation tree: one root frame per tab
///
/// There is always at least one tab and the active tab is always one of
/// them; deserializing a tree that breaks this fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeParts")]
pub struct NavigationTree {
    active_tab: TabId,
    tabs: Vec<Frame>,
}

#[derive(Deserialize)]
struct TreeParts {
    active_tab: TabId,
    tabs: Vec<Frame>,
}

impl TryFrom<TreeParts> for NavigationTree {
    type Error = String;

    fn try_from(parts: TreeParts) -> Result<Self, Self::Error> {
        if parts.active_tab.0 >= parts.tabs.len() {
            return Err(format!("active {} is not one of {} tabs", parts.active_tab, parts.tabs.len()));
        }
        Ok(Self { active_tab: parts.active_tab, tabs: parts.tabs })
    }
}

impl NavigationTree {
    /// Create an empty tree with `tab_count` tabs (at least one)
    pub fn new(tab_count: usize) -> Self {
        Self { active_tab: TabId(0), tabs: vec![Frame::default(); tab_count.max(1)] }
    }

    /// Currently active tab
    pub fn active_tab(&self) -> TabId {
        self.active_tab
    }

    /// Make `tab` active; returns `false` and changes nothing if there is no such tab
    pub fn set_active_tab(&mut self, tab: TabId) -> bool {
        if tab.0 >= self.tabs.len() {
            return false;
        }
        self.active_tab = tab;
        true
    }

    /// Number of tabs
    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Root frame of a tab
    pub fn tab(&self, tab: TabId) -> Option<&Frame> {
        self.tabs.get(tab.0)
    }

    /// Mutable root frame of a tab
    pub fn tab_mut(&mut self, tab: TabId) -> Option<&mut Frame> {
        self.tabs.get_mut(tab.0)
    }

    /// Root frame of the active tab
    pub fn active(&self) -> &Frame {
        &self.tabs[self.active_tab.0]
    }

    /// Mutable root frame of the active tab
    pub fn active_mut(&mut self) -> &mut Frame {
        &mut self.tabs[self.active_tab.0]
    }

    /// Whether any tab has pushed routes or overlays
    pub fn is_empty(&self) -> bool {
        self.tabs.iter().all(|f| f.stack.is_empty() && f.overlay.is_none())
    }
}
