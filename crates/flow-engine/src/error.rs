//! Flow error types

use storage::StorageError;
use thiserror::Error;

/// Errors raised by flow definitions and transitions
#[derive(Debug, Error)]
pub enum FlowError {
    /// No flow registered under this name
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    /// The flow has no live instance
    #[error("Flow not started: {0}")]
    NotStarted(String),

    /// The declaration is inconsistent
    #[error("Invalid flow definition {flow}: {reason}")]
    InvalidDefinition {
        /// Flow name
        flow: String,
        /// What is wrong
        reason: String,
    },

    /// Every step was skipped
    #[error("Flow {0} resolves to no steps")]
    EmptyFlow(String),

    /// `advance` at the last resolved step
    #[error("Already at the final step")]
    AtFinalStep,

    /// `complete` before the last resolved step
    #[error("Not at the final step")]
    NotAtFinalStep,

    /// `back` with nothing to return to
    #[error("No history to go back to")]
    NoHistory,

    /// Jump target is not reachable
    #[error("Cannot jump from {from} to {to}")]
    InvalidJump {
        /// Current step
        from: String,
        /// Requested step
        to: String,
    },

    /// The step validator rejected the transition
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The flow was cancelled while the transition was in flight
    #[error("Flow cancelled")]
    Cancelled,

    /// Snapshot persistence failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
