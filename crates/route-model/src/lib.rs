//! Route model for Waypoint
//!
//! This crate defines the closed vocabulary the rest of the navigation
//! engine speaks:
//! - [`Route`] values and their typed parameters
//! - [`PresentationStyle`] and the style resolver
//! - [`EntitlementRequirement`] and the entitlement gate
//! - [`RouteRegistry`], the immutable lookup tables built from route
//!   family declarations
//!
//! # Example
//!
//! ```rust
//! use route_model::{CaseDecl, ParamKind, ParamValue, PresentationStyle, RouteFamily, RouteRegistry};
//!
//! let registry = RouteRegistry::builder()
//!     .tab(
//!         RouteFamily::new("TasksRoute", "tasks")
//!             .case(CaseDecl::new("root"))
//!             .case(CaseDecl::new("detail").param("id", ParamKind::Int)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let route = registry
//!     .route("TasksRoute", "detail", vec![ParamValue::Int(123)])
//!     .unwrap();
//! assert_eq!(registry.resolve_style(&route), PresentationStyle::Push);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entitlement;
pub mod registry;
pub mod route;
pub mod style;

pub use entitlement::{Capability, EntitlementRequirement, EntitlementRule, EntitlementStore};
pub use registry::{
    CaseDecl, ParamDecl, RegistryBuilder, RouteError, RouteFamily, RouteRegistry, TabDecl, TabId,
    RESERVED_PARAM,
};
pub use route::{ParamKind, ParamValue, Route};
pub use style::{Detent, PresentationStyle, StyleParseError};
