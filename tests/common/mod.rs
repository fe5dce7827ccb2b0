//! Common test utilities for integration tests.
//!
//! Provides task fixtures, an in-memory provider, a plain formatter, and
//! tracing setup shared by the integration test binaries.

#![allow(dead_code)]

use std::sync::Once;

use chrono::NaiveDate;
use taskdeck::models::{Priority, Task, TaskStatus};
use taskdeck::traits::{SaveOutcome, TaskFormatter, TaskProvider, ValidationOutcome};

/// Initialize tracing once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A deterministic set of `count` tasks.
///
/// Record `i` gets urgency `count - i`, alternating pending/completed
/// status, project "home" for the first half and "work" for the rest,
/// tag "urgent" on every third record, and a due date on even ids.
pub fn sample_tasks(count: u64) -> Vec<Task> {
    (0..count)
        .map(|i| {
            let mut task = Task::new(i, format!("task {i}")).unwrap();
            task.urgency = (count - i) as f64;
            task.status = if i % 2 == 0 {
                TaskStatus::Pending
            } else {
                TaskStatus::Completed
            };
            task.project = if i < count / 2 {
                "home".to_string()
            } else {
                "work".to_string()
            };
            if i % 3 == 0 {
                task.tags.insert("urgent".to_string());
            }
            if i % 2 == 0 {
                task.due = NaiveDate::from_ymd_opt(2026, 9, 1)
                    .map(|d| d + chrono::Duration::days(i as i64));
            }
            if i % 5 == 0 {
                task.priority = Some(Priority::H);
            }
            task
        })
        .collect()
}

/// In-memory [`TaskProvider`] backed by a fixed record list.
pub struct MockProvider {
    pub records: Vec<Task>,
    pub reject_saves: bool,
}

impl MockProvider {
    pub fn new(records: Vec<Task>) -> Self {
        Self {
            records,
            reject_saves: false,
        }
    }
}

impl TaskProvider for MockProvider {
    fn get_records(&self, filter_expression: &str) -> Vec<Task> {
        if filter_expression.is_empty() {
            return self.records.clone();
        }
        // Provider-level filtering is just substring match on description
        self.records
            .iter()
            .filter(|t| t.description.contains(filter_expression))
            .cloned()
            .collect()
    }

    fn save_record(&self, record: &Task) -> SaveOutcome {
        if self.reject_saves {
            SaveOutcome::failed("provider unavailable")
        } else if record.description.is_empty() {
            SaveOutcome::failed("empty description")
        } else {
            SaveOutcome::ok()
        }
    }

    fn validate_record(&self, record: &Task) -> ValidationOutcome {
        if record.description.is_empty() {
            ValidationOutcome::invalid(vec!["description must be non-empty".to_string()])
        } else {
            ValidationOutcome::valid()
        }
    }
}

/// One-line-per-record formatter: `"<id> <description>"`.
pub struct PlainFormatter;

impl TaskFormatter for PlainFormatter {
    fn format_record(&self, record: &Task, _width: u16) -> Vec<String> {
        vec![format!("{} {}", record.id, record.description)]
    }
}

/// Formatter that emits a fixed number of lines per record, for
/// exercising multi-line clipping.
pub struct MultiLineFormatter {
    pub lines_per_record: usize,
}

impl TaskFormatter for MultiLineFormatter {
    fn format_record(&self, record: &Task, _width: u16) -> Vec<String> {
        (0..self.lines_per_record)
            .map(|n| format!("{}:{}", record.id, n))
            .collect()
    }
}
