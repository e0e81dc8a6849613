//! Multi-step flows for Waypoint
//!
//! A flow is an ordered list of steps with conditional branch and skip
//! rules. This crate provides:
//! - [`definition`] - flow declarations, conditions and step resolution
//! - [`state`] - the per-instance state machine (history, data bag)
//! - [`engine`] - the async engine: validation, cancellation, persistence
//!
//! # Example
//!
//! ```
//! use flow_engine::{ConditionSet, DataBag, FlowDefinition, FlowEngine};
//! use std::sync::Arc;
//!
//! # async fn demo() -> flow_engine::Result<()> {
//! let conditions = Arc::new(ConditionSet::new().with("has_account", true));
//! let engine = FlowEngine::builder()
//!     .flow(FlowDefinition::new("onboarding", ["welcome", "signup", "done"]).skip("signup", "has_account"))
//!     .conditions(conditions)
//!     .build()?;
//!
//! engine.start_flow("onboarding").await?;
//! let state = engine.advance("onboarding", DataBag::new()).await?;
//! assert_eq!(state.current_step(), "done");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod definition;
pub mod engine;
pub mod error;
pub mod state;

pub use definition::{BranchRule, ConditionEvaluator, ConditionSet, FlowDefinition, FlowStep, SkipRule};
pub use engine::{AcceptAll, FlowEngine, FlowEngineBuilder, StepValidator, DEFAULT_SNAPSHOT_VERSION};
pub use error::{FlowError, Result};
pub use state::{DataBag, FlowState};
