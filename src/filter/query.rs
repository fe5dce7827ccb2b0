//! Query-string parsing.
//!
//! The query language is whitespace-delimited tokens:
//!
//! - `+tag` / `-tag` — tag presence (include/exclude)
//! - `status:<pending|completed|deleted|waiting>`
//! - `project:<name>`
//! - `priority:<H|M|L>`
//! - `due:<today|tomorrow|eow|ISO-date>` (eow runs inclusive through
//!   Sunday)
//! - `urgency.gt:<number>` / `urgency.lt:<number>`
//!
//! Each token is parsed independently; an invalid token is skipped with
//! a warning and never aborts the rest of the query. Unknown field names
//! are likewise skipped (a typo in a field name behaves like an absent
//! filter — pinned by tests so the trade-off stays visible).

use chrono::{Datelike, Duration, Local, NaiveDate};
use tracing::warn;

use crate::filter::TaskFilter;
use crate::models::{Priority, TaskStatus};

/// Parse a query string into a filter list.
///
/// Invalid tokens are dropped with a warning; the returned filters are
/// the ones that parsed cleanly, in token order.
pub fn parse_query(query: &str) -> Vec<TaskFilter> {
    query
        .split_whitespace()
        .filter_map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> Option<TaskFilter> {
    if let Some(tag) = token.strip_prefix('+') {
        return match TaskFilter::tag(tag, true) {
            Ok(filter) => Some(filter),
            Err(_) => {
                warn!(token, "skipping empty tag token");
                None
            }
        };
    }
    if let Some(tag) = token.strip_prefix('-') {
        return match TaskFilter::tag(tag, false) {
            Ok(filter) => Some(filter),
            Err(_) => {
                warn!(token, "skipping empty tag token");
                None
            }
        };
    }

    let (field, value) = match token.split_once(':') {
        Some(pair) => pair,
        None => {
            warn!(token, "skipping bare query token");
            return None;
        }
    };

    match field {
        "status" => match value.parse::<TaskStatus>() {
            Ok(status) => Some(TaskFilter::Status(vec![status])),
            Err(_) => {
                warn!(token, "skipping unknown status value");
                None
            }
        },
        "project" => match TaskFilter::project(vec![value.to_string()]) {
            Ok(filter) => Some(filter),
            Err(_) => {
                warn!(token, "skipping empty project value");
                None
            }
        },
        "priority" => match value.parse::<Priority>() {
            Ok(priority) => Some(TaskFilter::Priority(vec![priority])),
            Err(_) => {
                warn!(token, "skipping unknown priority value");
                None
            }
        },
        "due" => parse_due(value),
        "urgency.gt" => match value.parse::<f64>() {
            Ok(min) => Some(TaskFilter::UrgencyRange {
                min: Some(min),
                max: None,
            }),
            Err(_) => {
                warn!(token, "skipping non-numeric urgency value");
                None
            }
        },
        "urgency.lt" => match value.parse::<f64>() {
            Ok(max) => Some(TaskFilter::UrgencyRange {
                min: None,
                max: Some(max),
            }),
            Err(_) => {
                warn!(token, "skipping non-numeric urgency value");
                None
            }
        },
        _ => {
            warn!(token, "skipping unknown query field");
            None
        }
    }
}

fn parse_due(value: &str) -> Option<TaskFilter> {
    let today = Local::now().date_naive();
    match value {
        "today" => Some(TaskFilter::due_range(Some(today), Some(today))),
        "tomorrow" => {
            let tomorrow = today + Duration::days(1);
            Some(TaskFilter::due_range(Some(tomorrow), Some(tomorrow)))
        }
        "eow" => {
            // Inclusive through Sunday
            let days_to_sunday = 6 - today.weekday().num_days_from_monday() as i64;
            let sunday = today + Duration::days(days_to_sunday);
            Some(TaskFilter::due_range(Some(today), Some(sunday)))
        }
        other => match NaiveDate::parse_from_str(other, "%Y-%m-%d") {
            Ok(date) => Some(TaskFilter::due_range(Some(date), Some(date))),
            // Unparseable dates are dropped without a warning
            Err(_) => None,
        },
    }
}
