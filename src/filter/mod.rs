//! Filters over task records.
//!
//! [`TaskFilter`] is a closed sum type: every predicate the engine knows
//! how to evaluate is a variant, so dispatch is exhaustive and invalid
//! combinators are unrepresentable. Each filter carries a canonical
//! string key used for cache-key construction and equality checks.
//!
//! Construction validates eagerly: a set filter with no values or an
//! inverted urgency range is rejected at the call boundary, never at
//! match time.

mod engine;
mod query;
mod sorter;

pub use engine::FilterEngine;
pub use query::parse_query;
pub use sorter::{SortDirection, SortField, SortSpec};

use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::models::{Priority, Task, TaskStatus};

use chrono::NaiveDate;

/// How a filter group combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLogic {
    /// Every child must match.
    And,
    /// At least one child must match.
    Or,
}

impl GroupLogic {
    /// Canonical lowercase form.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupLogic::And => "and",
            GroupLogic::Or => "or",
        }
    }
}

impl FromStr for GroupLogic {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "and" => Ok(GroupLogic::And),
            "or" => Ok(GroupLogic::Or),
            other => Err(EngineError::InvalidGroupLogic {
                value: other.to_string(),
            }),
        }
    }
}

/// A named predicate over one task record.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFilter {
    /// Status is one of the given set.
    Status(Vec<TaskStatus>),
    /// Project is one of the given set (exact, case-sensitive).
    Project(Vec<String>),
    /// Priority is set and one of the given set.
    Priority(Vec<Priority>),
    /// Tag presence: `include` keeps tasks carrying the tag, otherwise
    /// tasks not carrying it.
    Tag { tag: String, include: bool },
    /// Urgency strictly inside `(min, max)`; either bound may be open.
    UrgencyRange { min: Option<f64>, max: Option<f64> },
    /// Due date inside `[from, to]` inclusive; tasks without a due date
    /// never match. Either bound may be open.
    DueRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// Description contains the text.
    TextContains { text: String, case_sensitive: bool },
    /// A due date is set.
    HasDue,
    /// A project is set (non-empty).
    HasProject,
    /// AND/OR composite of child filters.
    Group {
        logic: GroupLogic,
        children: Vec<TaskFilter>,
    },
}

impl TaskFilter {
    /// Status-set filter. Rejects an empty set.
    pub fn status(statuses: Vec<TaskStatus>) -> EngineResult<Self> {
        if statuses.is_empty() {
            return Err(EngineError::EmptyFilter { kind: "status" });
        }
        Ok(TaskFilter::Status(statuses))
    }

    /// Project-set filter. Rejects an empty set or empty names.
    pub fn project(projects: Vec<String>) -> EngineResult<Self> {
        if projects.is_empty() || projects.iter().any(|p| p.is_empty()) {
            return Err(EngineError::EmptyFilter { kind: "project" });
        }
        Ok(TaskFilter::Project(projects))
    }

    /// Priority-set filter. Rejects an empty set.
    pub fn priority(priorities: Vec<Priority>) -> EngineResult<Self> {
        if priorities.is_empty() {
            return Err(EngineError::EmptyFilter { kind: "priority" });
        }
        Ok(TaskFilter::Priority(priorities))
    }

    /// Tag-presence filter. Rejects an empty tag.
    pub fn tag(tag: impl Into<String>, include: bool) -> EngineResult<Self> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(EngineError::EmptyFilter { kind: "tag" });
        }
        Ok(TaskFilter::Tag { tag, include })
    }

    /// Exclusive urgency-range filter. Rejects min above max.
    pub fn urgency_range(min: Option<f64>, max: Option<f64>) -> EngineResult<Self> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(EngineError::InvalidUrgencyRange { min, max });
            }
        }
        Ok(TaskFilter::UrgencyRange { min, max })
    }

    /// Inclusive due-date-range filter.
    pub fn due_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        TaskFilter::DueRange { from, to }
    }

    /// Text-contains filter. Rejects empty text.
    pub fn text_contains(text: impl Into<String>, case_sensitive: bool) -> EngineResult<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(EngineError::EmptyFilter { kind: "text" });
        }
        Ok(TaskFilter::TextContains {
            text,
            case_sensitive,
        })
    }

    /// AND/OR group. Rejects an empty child list.
    pub fn group(logic: GroupLogic, children: Vec<TaskFilter>) -> EngineResult<Self> {
        if children.is_empty() {
            return Err(EngineError::EmptyFilter { kind: "group" });
        }
        Ok(TaskFilter::Group { logic, children })
    }

    /// Evaluate the predicate against one record.
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::Status(statuses) => statuses.contains(&task.status),
            TaskFilter::Project(projects) => projects.iter().any(|p| *p == task.project),
            TaskFilter::Priority(priorities) => task
                .priority
                .map(|p| priorities.contains(&p))
                .unwrap_or(false),
            TaskFilter::Tag { tag, include } => task.has_tag(tag) == *include,
            TaskFilter::UrgencyRange { min, max } => {
                min.map_or(true, |m| task.urgency > m) && max.map_or(true, |m| task.urgency < m)
            }
            TaskFilter::DueRange { from, to } => match task.due {
                Some(due) => {
                    from.map_or(true, |f| due >= f) && to.map_or(true, |t| due <= t)
                }
                None => false,
            },
            TaskFilter::TextContains {
                text,
                case_sensitive,
            } => {
                if *case_sensitive {
                    task.description.contains(text.as_str())
                } else {
                    task.description
                        .to_lowercase()
                        .contains(&text.to_lowercase())
                }
            }
            TaskFilter::HasDue => task.due.is_some(),
            TaskFilter::HasProject => task.has_project(),
            TaskFilter::Group { logic, children } => match logic {
                GroupLogic::And => children.iter().all(|c| c.matches(task)),
                GroupLogic::Or => children.iter().any(|c| c.matches(task)),
            },
        }
    }

    /// Canonical string key, used for cache keys and removal by
    /// equality.
    pub fn cache_key(&self) -> String {
        match self {
            TaskFilter::Status(statuses) => {
                let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
                format!("status={}", names.join(","))
            }
            TaskFilter::Project(projects) => format!("project={}", projects.join(",")),
            TaskFilter::Priority(priorities) => {
                let names: Vec<&str> = priorities.iter().map(|p| p.as_str()).collect();
                format!("priority={}", names.join(","))
            }
            TaskFilter::Tag { tag, include } => {
                format!("{}tag={}", if *include { "+" } else { "-" }, tag)
            }
            TaskFilter::UrgencyRange { min, max } => format!(
                "urgency=({},{})",
                min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".into()),
                max.map(|v| v.to_string()).unwrap_or_else(|| "+inf".into()),
            ),
            TaskFilter::DueRange { from, to } => format!(
                "due=[{},{}]",
                from.map(|d| d.to_string()).unwrap_or_else(|| "open".into()),
                to.map(|d| d.to_string()).unwrap_or_else(|| "open".into()),
            ),
            TaskFilter::TextContains {
                text,
                case_sensitive,
            } => format!(
                "text{}={}",
                if *case_sensitive { "" } else { "~" },
                text
            ),
            TaskFilter::HasDue => "has-due".to_string(),
            TaskFilter::HasProject => "has-project".to_string(),
            TaskFilter::Group { logic, children } => {
                let keys: Vec<String> = children.iter().map(|c| c.cache_key()).collect();
                format!("{}({})", logic.as_str(), keys.join("&"))
            }
        }
    }
}
