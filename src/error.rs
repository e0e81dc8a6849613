//! Unified error type

use deep_link::{DecodeError, DeepLinkError, EncodeError};
use flow_engine::FlowError;
use navigation::NavigationError;
use route_model::RouteError;
use storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the [`Navigator`](crate::Navigator) facade
#[derive(Debug, Error)]
pub enum WaypointError {
    /// Route declaration or construction failed
    #[error(transparent)]
    Route(#[from] RouteError),

    /// A navigation transition failed
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    /// A flow transition failed
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// A deep link was rejected
    #[error(transparent)]
    DeepLink(#[from] DeepLinkError),

    /// A URL path did not decode to a route
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// State could not be expressed as a deep link
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Snapshot storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for facade operations
pub type Result<T> = std::result::Result<T, WaypointError>;
