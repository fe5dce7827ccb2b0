//! Error types for the taskdeck engine.
//!
//! Read paths (cache lookups, data-source indexing, filtered queries)
//! never error for "not found" — they return `Option`/empty values.
//! Errors are reserved for invalid construction and mutation at call
//! boundaries, and for background-task and resource failures.

use thiserror::Error;

/// Unified error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A task record was constructed without a description.
    #[error("task description must be non-empty")]
    EmptyDescription,

    /// An unknown status string was supplied (query or provider data).
    #[error("invalid task status: {value:?}")]
    InvalidStatus { value: String },

    /// An unknown priority string was supplied.
    #[error("invalid priority: {value:?} (expected H, M, or L)")]
    InvalidPriority { value: String },

    /// A filter was constructed with nothing to match against.
    #[error("filter {kind:?} requires at least one value")]
    EmptyFilter { kind: &'static str },

    /// A filter group was constructed with an unknown combinator.
    #[error("invalid group logic: {value:?} (expected \"and\" or \"or\")")]
    InvalidGroupLogic { value: String },

    /// An urgency range was constructed with min above max.
    #[error("invalid urgency range: min {min} exceeds max {max}")]
    InvalidUrgencyRange { min: f64, max: f64 },

    /// A memory pool has no free items left.
    #[error("resource pool {pool:?} exhausted ({max_size} items checked out)")]
    PoolExhausted { pool: String, max_size: usize },

    /// An item was returned to a pool that is already full.
    #[error("resource pool {pool:?} is full; cannot return item")]
    PoolOverflow { pool: String },

    /// A tracked resource id was not found.
    #[error("unknown resource: {id:?}")]
    UnknownResource { id: String },

    /// A background task could not be queued because the processor has
    /// been stopped.
    #[error("background processor is not accepting tasks")]
    ProcessorStopped,
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
