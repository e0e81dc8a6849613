//! Waypoint: recursive navigation and deep-link routing
//!
//! The workspace crates each own one concern:
//! - [`route_model`] - routes, presentation styles, entitlement rules
//! - [`navigation`] - the presentation tree and its coordinator
//! - [`flow_engine`] - multi-step flows with branching and skipping
//! - [`deep_link`] - URL codec and deep link resolver
//! - [`storage`] - snapshot persistence
//!
//! This crate ties them together behind [`Navigator`] and provides
//! configuration and logging setup.
//!
//! # Example
//!
//! ```
//! use waypoint::{CaseDecl, Navigator, NavigatorConfig, ParamKind, RouteFamily, RouteRegistry};
//!
//! # async fn demo() -> waypoint::Result<()> {
//! let registry = RouteRegistry::builder()
//!     .tab(
//!         RouteFamily::new("Tasks", "tasks")
//!             .case(CaseDecl::new("root"))
//!             .case(CaseDecl::new("detail").param("id", ParamKind::Int)),
//!     )
//!     .build()?;
//!
//! let navigator = Navigator::builder(registry)
//!     .config(NavigatorConfig::new("app").host("x"))
//!     .build()?;
//!
//! navigator.handle("app://x/tasks/detail/42").await?;
//! assert_eq!(navigator.current_deep_link()?, "app://x/tasks/detail/42");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;
pub mod navigator;

pub use config::NavigatorConfig;
pub use error::{Result, WaypointError};
pub use logging::{init_tracing, LogConfig, LogFormat};
pub use navigator::{HandleOutcome, Navigator, NavigatorBuilder};

pub use deep_link::{DeepLinkPlan, DeepLinkUrl, Resolution};
pub use flow_engine::{ConditionSet, DataBag, FlowDefinition, FlowState};
pub use navigation::{NavigationAction, NavigationOutcome, NavigationTree};
pub use route_model::{
    Capability, CaseDecl, Detent, EntitlementRequirement, EntitlementStore, ParamKind, ParamValue,
    PresentationStyle, Route, RouteFamily, RouteRegistry, TabId,
};

pub use deep_link;
pub use flow_engine;
pub use navigation;
pub use route_model;
pub use storage;
