//! Task record types for the engine.
//!
//! Records are owned by the external provider; the engine treats them as
//! immutable snapshots per query cycle. Mutation happens only through
//! explicit save operations routed back to the provider.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is open and actionable (the default).
    #[default]
    Pending,
    /// Task has been finished.
    Completed,
    /// Task was removed without being finished.
    Deleted,
    /// Task is blocked until some wait condition passes.
    Waiting,
}

impl TaskStatus {
    /// Canonical lowercase form, as used in queries and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
            TaskStatus::Waiting => "waiting",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "deleted" => Ok(TaskStatus::Deleted),
            "waiting" => Ok(TaskStatus::Waiting),
            other => Err(EngineError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// High.
    H,
    /// Medium.
    M,
    /// Low.
    L,
}

impl Priority {
    /// Canonical single-letter form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::H => "H",
            Priority::M => "M",
            Priority::L => "L",
        }
    }
}

impl FromStr for Priority {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H" => Ok(Priority::H),
            "M" => Ok(Priority::M),
            "L" => Ok(Priority::L),
            other => Err(EngineError::InvalidPriority {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One task record.
///
/// `description` is the only required field; everything else is
/// independently defaulted. Provider-specific fields that the engine does
/// not model land in `custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Working-set id assigned by the provider (stable within a session).
    pub id: u64,
    /// Canonical UUID, when the provider assigns one.
    #[serde(default)]
    pub uuid: Option<Uuid>,
    /// Human-readable description (non-empty).
    pub description: String,
    /// Lifecycle status (default pending).
    #[serde(default)]
    pub status: TaskStatus,
    /// Project name (empty string when unset).
    #[serde(default)]
    pub project: String,
    /// Priority, when set.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Computed urgency score (default 0.0).
    #[serde(default)]
    pub urgency: f64,
    /// Due date, when set.
    #[serde(default)]
    pub due: Option<NaiveDate>,
    /// Tag set.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// When the record was created, if the provider reports it.
    #[serde(default)]
    pub entry: Option<DateTime<Utc>>,
    /// When the record was last modified, if the provider reports it.
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// Provider-specific fields the engine passes through untouched.
    #[serde(default)]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Create a minimal pending task.
    ///
    /// Rejects an empty (or whitespace-only) description at the call
    /// boundary.
    pub fn new(id: u64, description: impl Into<String>) -> EngineResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(EngineError::EmptyDescription);
        }
        Ok(Self {
            id,
            uuid: None,
            description,
            status: TaskStatus::Pending,
            project: String::new(),
            priority: None,
            urgency: 0.0,
            due: None,
            tags: BTreeSet::new(),
            entry: None,
            modified: None,
            custom: BTreeMap::new(),
        })
    }

    /// Check whether the task carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// True when a project is set (non-empty).
    pub fn has_project(&self) -> bool {
        !self.project.is_empty()
    }
}
