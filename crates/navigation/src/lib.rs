//! Presentation tree and navigation coordinator for Waypoint
//!
//! This crate owns the live navigation state:
//! - [`tree`] - per-tab stacks with recursively nested overlays
//! - [`coordinator`] - transitions (navigate, dismiss, pop to root, switch
//!   tab) with entitlement pre-checks and all-or-nothing compound actions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod tree;

pub use coordinator::{
    BlockedNavigation, CoordinatorConfig, NavigationAction, NavigationCoordinator,
    NavigationError, NavigationOutcome, Transition, TransitionKind, DEFAULT_MAX_OVERLAY_DEPTH,
};
pub use tree::{Frame, NavigationTree, PresentationNode, StackEntry};
