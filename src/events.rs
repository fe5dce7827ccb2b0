//! Engine event types published on the [`EventBus`](crate::bus::EventBus).
//!
//! Every event carries a typed payload struct; subscribers key their
//! interest by [`EventKind`] and pattern-match on [`EngineEvent`] to get
//! at the fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::background::TaskPriority;

/// The active filter list changed (add, remove, clear, or query apply).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiltersChanged {
    /// Number of top-level filters now installed.
    pub filter_count: usize,
    /// Canonical string form of each installed filter.
    pub filters: Vec<String>,
}

/// A filtered query completed and produced a (possibly cached) result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResultsChanged {
    /// Records in the result set.
    pub result_count: usize,
    /// Records in the unfiltered data source.
    pub total_count: usize,
    /// Top-level filters that were applied.
    pub filter_count: usize,
}

/// The viewport scroll position changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportScrolled {
    /// Position before the scroll.
    pub old_position: usize,
    /// Position after clamping.
    pub new_position: usize,
    /// Maximum legal scroll position for the current total.
    pub max_position: usize,
    /// Total records in the backing view.
    pub total_items: usize,
}

/// The set of visible records changed (scroll, data swap, or refresh).
///
/// Only published when the symmetric difference is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVisibilityChanged {
    /// Record ids that entered the viewport.
    pub newly_visible: Vec<u64>,
    /// Record ids that left the viewport.
    pub newly_invisible: Vec<u64>,
    /// Records visible after the change.
    pub total_visible: usize,
}

/// A cache entry was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryAdded {
    /// Cache key.
    pub key: String,
    /// Level tag (e.g. "L1").
    pub level: String,
    /// Estimated size in bytes.
    pub size_bytes: usize,
    /// Time to live in seconds.
    pub ttl_secs: u64,
}

/// A cache entry was explicitly invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryInvalidated {
    /// Cache key that was removed.
    pub key: String,
}

/// Entries were evicted to stay within the memory budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEviction {
    /// Number of entries removed in this round.
    pub entries_removed: usize,
    /// Why eviction ran (e.g. "memory budget exceeded").
    pub reason: String,
}

/// An expiry sweep finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCleanupCompleted {
    /// Expired entries removed by the sweep.
    pub entries_removed: usize,
}

/// A background task was accepted into the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQueued {
    /// Unique task id.
    pub task_id: Uuid,
    /// Human-readable task name.
    pub task_name: String,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// When the task was queued.
    pub queue_time: DateTime<Utc>,
}

/// A background task finished successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompleted {
    /// Unique task id.
    pub task_id: Uuid,
    /// Human-readable task name.
    pub task_name: String,
    /// Result payload produced by the task body.
    pub result: serde_json::Value,
    /// Wall-clock execution time in milliseconds.
    pub duration_ms: u64,
}

/// A background task failed (error return or panic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailed {
    /// Unique task id.
    pub task_id: Uuid,
    /// Human-readable task name.
    pub task_name: String,
    /// Error message captured from the task body.
    pub error: String,
    /// Wall-clock execution time in milliseconds.
    pub duration_ms: u64,
}

/// Timing/memory measurement for a tracked operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// Name passed to `start_tracking`.
    pub operation: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Process memory delta across the operation, in bytes (may be
    /// negative when memory was released).
    pub memory_delta_bytes: i64,
}

/// A tracked operation exceeded the bottleneck threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceBottleneck {
    /// Name of the slow operation.
    pub operation: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Process memory usage when the operation finished, in bytes.
    pub memory_usage_bytes: u64,
}

/// Unused tracked resources were disposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesCleanedUp {
    /// Number of resources removed.
    pub resources_removed: usize,
}

/// Sum type over every event the engine publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Filter list changed.
    FiltersChanged(FiltersChanged),
    /// Filtered results recomputed.
    FilterResultsChanged(FilterResultsChanged),
    /// Viewport scrolled.
    ViewportScrolled(ViewportScrolled),
    /// Visible-record set changed.
    ItemVisibilityChanged(ItemVisibilityChanged),
    /// Cache entry committed.
    CacheEntryAdded(CacheEntryAdded),
    /// Cache entry invalidated.
    CacheEntryInvalidated(CacheEntryInvalidated),
    /// Cache eviction round completed.
    CacheEviction(CacheEviction),
    /// Cache expiry sweep completed.
    CacheCleanupCompleted(CacheCleanupCompleted),
    /// Background task queued.
    TaskQueued(TaskQueued),
    /// Background task completed.
    TaskCompleted(TaskCompleted),
    /// Background task failed.
    TaskFailed(TaskFailed),
    /// Performance measurement recorded.
    PerformanceMetric(PerformanceMetric),
    /// Performance bottleneck detected.
    PerformanceBottleneck(PerformanceBottleneck),
    /// Tracked resources cleaned up.
    ResourcesCleanedUp(ResourcesCleanedUp),
}

/// Discriminant used to key subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FiltersChanged,
    FilterResultsChanged,
    ViewportScrolled,
    ItemVisibilityChanged,
    CacheEntryAdded,
    CacheEntryInvalidated,
    CacheEviction,
    CacheCleanupCompleted,
    TaskQueued,
    TaskCompleted,
    TaskFailed,
    PerformanceMetric,
    PerformanceBottleneck,
    ResourcesCleanedUp,
}

impl EngineEvent {
    /// The subscription key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::FiltersChanged(_) => EventKind::FiltersChanged,
            EngineEvent::FilterResultsChanged(_) => EventKind::FilterResultsChanged,
            EngineEvent::ViewportScrolled(_) => EventKind::ViewportScrolled,
            EngineEvent::ItemVisibilityChanged(_) => EventKind::ItemVisibilityChanged,
            EngineEvent::CacheEntryAdded(_) => EventKind::CacheEntryAdded,
            EngineEvent::CacheEntryInvalidated(_) => EventKind::CacheEntryInvalidated,
            EngineEvent::CacheEviction(_) => EventKind::CacheEviction,
            EngineEvent::CacheCleanupCompleted(_) => EventKind::CacheCleanupCompleted,
            EngineEvent::TaskQueued(_) => EventKind::TaskQueued,
            EngineEvent::TaskCompleted(_) => EventKind::TaskCompleted,
            EngineEvent::TaskFailed(_) => EventKind::TaskFailed,
            EngineEvent::PerformanceMetric(_) => EventKind::PerformanceMetric,
            EngineEvent::PerformanceBottleneck(_) => EventKind::PerformanceBottleneck,
            EngineEvent::ResourcesCleanedUp(_) => EventKind::ResourcesCleanedUp,
        }
    }
}
