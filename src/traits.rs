//! Collaborator seams for the engine.
//!
//! The engine never talks to the underlying task-tracking process or the
//! terminal directly. Records come in through a [`TaskProvider`] and
//! visible records go out through a [`TaskFormatter`]. Both are trait
//! objects so tests can substitute in-memory fakes.

use crate::models::Task;

/// Outcome of a save request routed back to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// True when the provider accepted the record.
    pub success: bool,
    /// Provider-supplied error message when `success` is false.
    pub error: Option<String>,
}

impl SaveOutcome {
    /// A successful save.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A rejected save with the provider's message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Outcome of provider-side record validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// True when the record passed all provider checks.
    pub valid: bool,
    /// One message per failed check.
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    /// A clean validation result.
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A failed validation result.
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Source of task records.
///
/// Implemented outside the engine by whatever wraps the task-tracking
/// process. Fetching may block on I/O, so callers route provider access
/// through the background processor rather than the interactive path.
pub trait TaskProvider: Send + Sync {
    /// Fetch records matching a provider-level filter expression
    /// (empty string fetches everything).
    fn get_records(&self, filter_expression: &str) -> Vec<Task>;

    /// Persist one record back to the provider.
    fn save_record(&self, record: &Task) -> SaveOutcome;

    /// Validate a record without persisting it.
    fn validate_record(&self, record: &Task) -> ValidationOutcome;
}

/// Turns one record into display lines for the renderer.
///
/// The viewport calls this once per visible record per render pass; lines
/// longer than `width` are the formatter's problem to wrap or truncate.
pub trait TaskFormatter {
    /// Format a record into one or more display lines sized to `width`.
    fn format_record(&self, record: &Task, width: u16) -> Vec<String>;
}
