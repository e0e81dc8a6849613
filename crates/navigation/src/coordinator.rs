//! Navigation coordinator
//!
//! The single owner of the [`NavigationTree`]. Every transition is a
//! synchronous `&mut self` mutation, and every transition checks
//! entitlements before touching the tree, so a blocked or failed
//! navigation leaves the tree exactly as it was.

use crate::tree::{Frame, NavigationTree, PresentationNode, StackEntry};
use route_model::{
    EntitlementRequirement, EntitlementStore, PresentationStyle, Route, RouteRegistry, TabId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Default cap on nested overlays
pub const DEFAULT_MAX_OVERLAY_DEPTH: usize = 50;

/// Navigation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// Tab index out of range
    #[error("Unknown tab: {0}")]
    UnknownTab(TabId),

    /// Presenting would exceed the overlay depth cap
    #[error("Overlay depth limit of {limit} reached")]
    MaxDepthExceeded {
        /// Configured limit
        limit: usize,
    },
}

/// Result type for navigation operations
pub type Result<T> = std::result::Result<T, NavigationError>;

/// Outcome of a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The tree was updated
    Applied,
    /// The caller lacks the entitlement; the tree is unchanged
    Blocked(EntitlementRequirement),
}

impl NavigationOutcome {
    /// Whether the navigation was applied
    pub fn is_applied(&self) -> bool {
        matches!(self, NavigationOutcome::Applied)
    }
}

/// A single step of a compound navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum NavigationAction {
    /// Make a tab active
    SwitchTab {
        /// Target tab
        tab: TabId,
    },
    /// Dismiss every overlay in the active tab and clear its stack
    ResetTab,
    /// Navigate to a route with a style
    Navigate {
        /// Target route
        route: Route,
        /// Presentation style
        style: PresentationStyle,
    },
    /// Dismiss overlays
    Dismiss {
        /// Number of overlay levels
        levels: usize,
    },
    /// Clear the active tab's root stack
    PopToRoot,
}

/// Kind of the last applied transition, for animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// Route pushed
    #[default]
    Push,
    /// Route popped
    Pop,
    /// Top route replaced
    Replace,
    /// Overlay presented
    Present,
    /// Overlay dismissed
    Dismiss,
    /// Active tab changed
    SwitchTab,
    /// Several changes at once (instant)
    None,
}

/// Pending transition awaiting animation completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Transition kind
    pub kind: TransitionKind,
    /// Route that became visible, if any
    pub route: Option<Route>,
    /// Tab the transition happened in
    pub tab: TabId,
}

/// A navigation denied by the entitlement gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedNavigation {
    /// Requested route
    pub route: Route,
    /// Requirement the caller failed
    pub requirement: EntitlementRequirement,
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Cap on nested overlays per tab (`None` for unbounded)
    pub max_overlay_depth: Option<usize>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { max_overlay_depth: Some(DEFAULT_MAX_OVERLAY_DEPTH) }
    }
}

impl CoordinatorConfig {
    /// Set the overlay depth cap
    pub fn max_overlay_depth(mut self, limit: Option<usize>) -> Self {
        self.max_overlay_depth = limit;
        self
    }
}

/// Owner of the presentation tree
pub struct NavigationCoordinator {
    registry: RouteRegistry,
    entitlements: Arc<dyn EntitlementStore>,
    config: CoordinatorConfig,
    tree: NavigationTree,
    pending: Option<Transition>,
    blocked: Option<BlockedNavigation>,
}

impl std::fmt::Debug for NavigationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationCoordinator")
            .field("config", &self.config)
            .field("tree", &self.tree)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl NavigationCoordinator {
    /// Create a coordinator with one empty frame per declared tab
    pub fn new(
        registry: RouteRegistry,
        entitlements: Arc<dyn EntitlementStore>,
        config: CoordinatorConfig,
    ) -> Self {
        let tree = NavigationTree::new(registry.tabs().len());
        Self { registry, entitlements, config, tree, pending: None, blocked: None }
    }

    /// The route registry
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// The entitlement store
    pub fn entitlements(&self) -> &dyn EntitlementStore {
        self.entitlements.as_ref()
    }

    /// Current tree
    pub fn tree(&self) -> &NavigationTree {
        &self.tree
    }

    /// Replace the whole tree (e.g. restoring a saved snapshot)
    pub fn restore(&mut self, tree: NavigationTree) -> Result<()> {
        if tree.tab_count() != self.tree.tab_count() {
            return Err(NavigationError::UnknownTab(tree.active_tab()));
        }
        self.tree = tree;
        self.pending = None;
        Ok(())
    }

    /// Active tab
    pub fn active_tab(&self) -> TabId {
        self.tree.active_tab()
    }

    /// Root stack of a tab
    pub fn tab_stack(&self, tab: TabId) -> Option<&[StackEntry]> {
        self.tree.tab(tab).map(Frame::stack)
    }

    /// Overlay chain of the active tab, outermost first
    pub fn overlays(&self) -> Vec<&PresentationNode> {
        self.tree.active().overlay_chain()
    }

    /// Number of overlays open in the active tab
    pub fn overlay_depth(&self) -> usize {
        self.tree.active().overlay_depth()
    }

    /// Route currently visible in the active tab
    pub fn current_route(&self) -> Option<&Route> {
        self.tree.active().visible_route()
    }

    /// Whether `go_back` would do anything
    pub fn can_go_back(&self) -> bool {
        let frame = self.tree.active();
        frame.overlay_depth() > 0 || !frame.stack().is_empty()
    }

    /// Pending transition, if any
    pub fn pending_transition(&self) -> Option<&Transition> {
        self.pending.as_ref()
    }

    /// Mark the pending transition as finished
    pub fn complete_transition(&mut self) {
        self.pending = None;
    }

    /// Last navigation blocked with an auto-block-UI requirement
    pub fn blocked(&self) -> Option<&BlockedNavigation> {
        self.blocked.as_ref()
    }

    /// Note a denied navigation found outside [`apply`](Self::apply)
    ///
    /// Kept only when its requirement asks for blocking UI; returns whether
    /// it was kept.
    pub fn record_blocked(&mut self, blocked: BlockedNavigation) -> bool {
        if !blocked.requirement.auto_block_ui {
            return false;
        }
        self.blocked = Some(blocked);
        true
    }

    /// Clear the blocked navigation once its blocking UI was handled
    pub fn clear_blocked(&mut self) -> Option<BlockedNavigation> {
        self.blocked.take()
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Navigate to a route with an explicit style
    pub fn navigate(&mut self, route: Route, style: PresentationStyle) -> Result<NavigationOutcome> {
        self.apply(vec![NavigationAction::Navigate { route, style }])
    }

    /// Navigate using the route's declared style
    pub fn navigate_resolved(&mut self, route: Route) -> Result<NavigationOutcome> {
        let style = self.registry.resolve_style(&route);
        self.navigate(route, style)
    }

    /// Dismiss up to `levels` overlays; extra levels are ignored
    pub fn dismiss(&mut self, levels: usize) -> usize {
        let popped = self.tree.active_mut().dismiss_levels(levels);
        if popped > 0 {
            tracing::debug!(popped, requested = levels, "Dismissed overlays");
            self.set_pending(TransitionKind::Dismiss);
        }
        popped
    }

    /// Dismiss the innermost overlay unless its route locks interactive dismissal
    pub fn interactive_dismiss(&mut self) -> bool {
        let locked = match self.tree.active().innermost_overlay() {
            Some(node) => self.registry.is_dismiss_locked(&node.route),
            None => return false,
        };
        if locked {
            tracing::debug!("Interactive dismiss refused by dismiss lock");
            return false;
        }
        self.dismiss(1) == 1
    }

    /// Clear the active tab's root stack; overlays stay
    pub fn pop_to_root(&mut self) {
        self.tree.active_mut().clear_stack();
        self.set_pending(TransitionKind::Pop);
    }

    /// Go back one step: pop inside the innermost overlay, else dismiss it, else pop the root stack
    pub fn go_back(&mut self) -> bool {
        let frame = self.tree.active_mut();
        let depth = frame.overlay_depth();
        let kind = if frame.innermost_mut().pop().is_some() {
            TransitionKind::Pop
        } else if depth > 0 {
            frame.dismiss_levels(1);
            TransitionKind::Dismiss
        } else {
            return false;
        };
        self.set_pending(kind);
        true
    }

    /// Switch tabs, then replay `then` against the new tab, all or nothing
    pub fn switch_tab(&mut self, tab: TabId, then: Vec<(Route, PresentationStyle)>) -> Result<NavigationOutcome> {
        let mut actions = vec![NavigationAction::SwitchTab { tab }];
        actions.extend(then.into_iter().map(|(route, style)| NavigationAction::Navigate { route, style }));
        self.apply(actions)
    }

    /// Apply a compound transition atomically
    ///
    /// Entitlements for every navigate action are checked first, in order;
    /// the first denial returns [`NavigationOutcome::Blocked`] without
    /// mutation. The actions then run against a scratch copy of the tree
    /// which only replaces the live tree if every action succeeds.
    pub fn apply(&mut self, actions: Vec<NavigationAction>) -> Result<NavigationOutcome> {
        if let Some(blocked) = self.first_blocked(&actions) {
            tracing::warn!(
                route = %blocked.route,
                auto_block_ui = blocked.requirement.auto_block_ui,
                "Navigation blocked by entitlement"
            );
            let requirement = blocked.requirement.clone();
            self.record_blocked(blocked);
            return Ok(NavigationOutcome::Blocked(requirement));
        }

        let mut scratch = self.tree.clone();
        let mut last_kind = TransitionKind::None;
        for action in &actions {
            last_kind = self.apply_one(&mut scratch, action)?;
        }

        self.tree = scratch;
        let kind = if actions.len() == 1 { last_kind } else { TransitionKind::None };
        self.set_pending(kind);
        tracing::debug!(actions = actions.len(), tab = %self.tree.active_tab(), "Navigation applied");
        Ok(NavigationOutcome::Applied)
    }

    /// Reset the whole tree
    pub fn reset(&mut self) {
        self.tree = NavigationTree::new(self.registry.tabs().len());
        self.pending = None;
        self.blocked = None;
    }

    fn first_blocked(&self, actions: &[NavigationAction]) -> Option<BlockedNavigation> {
        actions.iter().find_map(|action| {
            let NavigationAction::Navigate { route, .. } = action else {
                return None;
            };
            let requirement = self.registry.resolve_entitlement(route);
            if requirement.is_satisfied_by(self.entitlements.as_ref()) {
                None
            } else {
                Some(BlockedNavigation { route: route.clone(), requirement })
            }
        })
    }

    fn apply_one(&self, tree: &mut NavigationTree, action: &NavigationAction) -> Result<TransitionKind> {
        match action {
            NavigationAction::SwitchTab { tab } => {
                if !tree.set_active_tab(*tab) {
                    return Err(NavigationError::UnknownTab(*tab));
                }
                Ok(TransitionKind::SwitchTab)
            }
            NavigationAction::ResetTab => {
                let frame = tree.active_mut();
                frame.dismiss_overlay();
                frame.clear_stack();
                Ok(TransitionKind::None)
            }
            NavigationAction::Dismiss { levels } => {
                tree.active_mut().dismiss_levels(*levels);
                Ok(TransitionKind::Dismiss)
            }
            NavigationAction::PopToRoot => {
                tree.active_mut().clear_stack();
                Ok(TransitionKind::Pop)
            }
            NavigationAction::Navigate { route, style } => self.apply_navigate(tree, route, style),
        }
    }

    fn apply_navigate(
        &self,
        tree: &mut NavigationTree,
        route: &Route,
        style: &PresentationStyle,
    ) -> Result<TransitionKind> {
        match style {
            PresentationStyle::Push => {
                tree.active_mut().innermost_mut().push(route.clone());
                Ok(TransitionKind::Push)
            }
            PresentationStyle::Replace => {
                tree.active_mut().innermost_mut().replace_top(route.clone());
                Ok(TransitionKind::Replace)
            }
            PresentationStyle::Tab(index) => {
                let tab = TabId(*index);
                if !tree.set_active_tab(tab) {
                    return Err(NavigationError::UnknownTab(tab));
                }
                Ok(TransitionKind::SwitchTab)
            }
            overlay => {
                let frame = tree.active_mut();
                if let Some(limit) = self.config.max_overlay_depth {
                    if frame.overlay_depth() >= limit {
                        return Err(NavigationError::MaxDepthExceeded { limit });
                    }
                }
                frame
                    .innermost_mut()
                    .present(PresentationNode::new(route.clone(), overlay.clone()));
                Ok(TransitionKind::Present)
            }
        }
    }

    fn set_pending(&mut self, kind: TransitionKind) {
        self.pending = Some(Transition {
            kind,
            route: self.current_route().cloned(),
            tab: self.tree.active_tab(),
        });
    }
}
