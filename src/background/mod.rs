//! Bounded-concurrency background task execution.
//!
//! Longer operations (sync, import, bulk edits) are queued here so they
//! never block the interactive path. The processor is a worker pool:
//! tasks land in an unbounded FIFO channel, and `max_concurrent_tasks`
//! workers share the receiver with a blocking receive — no polling
//! loops. Task bodies may block arbitrarily (I/O, external process
//! calls); each runs under `spawn_blocking`, isolated per task.
//!
//! Status transitions are forward-only:
//! `Queued → Running → {Completed | Failed}`, or
//! `Queued → Cancelled` (cancellation before dequeue only; started work
//! is never preempted).

pub mod perf;
pub mod resources;

pub use perf::{MemoryUsage, PerformanceMonitor};
pub use resources::{MemoryPool, ResourceManager};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, TaskCompleted, TaskFailed, TaskQueued};

/// Work executed by a background task. May block; runs on a blocking
/// worker thread.
pub type TaskAction = Box<dyn FnOnce() -> Result<serde_json::Value, String> + Send + 'static>;

/// Scheduling priority recorded on a task.
///
/// Priority is carried on the task record and its events; dispatch
/// order is queue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Lifecycle state of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundTaskStatus {
    /// Accepted, not yet picked up by a worker.
    Queued,
    /// A worker is executing the body.
    Running,
    /// Body returned a result.
    Completed,
    /// Body returned an error or panicked.
    Failed,
    /// Cancelled before a worker dequeued it.
    Cancelled,
}

impl BackgroundTaskStatus {
    /// True for states no transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BackgroundTaskStatus::Completed
                | BackgroundTaskStatus::Failed
                | BackgroundTaskStatus::Cancelled
        )
    }
}

/// Snapshot of one background task's bookkeeping.
#[derive(Debug, Clone)]
pub struct BackgroundTask {
    /// Unique id assigned at queue time.
    pub id: Uuid,
    /// Human-readable name for events and logs.
    pub name: String,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Current lifecycle state.
    pub status: BackgroundTaskStatus,
    /// When the task was accepted.
    pub queued_at: DateTime<Utc>,
    /// When a worker started the body.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Result payload, when completed.
    pub result: Option<serde_json::Value>,
    /// Error message, when failed.
    pub error: Option<String>,
}

/// Counts by status, from [`BackgroundProcessor::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessorStatistics {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

struct QueuedWork {
    id: Uuid,
    action: TaskAction,
}

/// Worker-pool background task processor.
pub struct BackgroundProcessor {
    max_concurrent: usize,
    bus: Arc<EventBus>,
    queue_tx: mpsc::UnboundedSender<QueuedWork>,
    queue_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedWork>>>,
    tasks: Arc<Mutex<HashMap<Uuid, BackgroundTask>>>,
    active_count: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl BackgroundProcessor {
    /// Create a processor that runs at most `max_concurrent` task bodies
    /// at once.
    pub fn new(max_concurrent: usize, bus: Arc<EventBus>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            max_concurrent: max_concurrent.max(1),
            bus,
            queue_tx,
            queue_rx: Arc::new(tokio::sync::Mutex::new(queue_rx)),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            active_count: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            started: AtomicBool::new(false),
        }
    }

    /// Queue a task with normal priority. Returns its id.
    pub fn queue_task(&self, name: impl Into<String>, action: TaskAction) -> EngineResult<Uuid> {
        self.queue_task_with_priority(name, TaskPriority::Normal, action)
    }

    /// Queue a task with an explicit priority. Returns its id.
    pub fn queue_task_with_priority(
        &self,
        name: impl Into<String>,
        priority: TaskPriority,
        action: TaskAction,
    ) -> EngineResult<Uuid> {
        let id = Uuid::new_v4();
        let name = name.into();
        let queued_at = Utc::now();

        let record = BackgroundTask {
            id,
            name: name.clone(),
            priority,
            status: BackgroundTaskStatus::Queued,
            queued_at,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };
        self.tasks
            .lock()
            .expect("task map lock poisoned")
            .insert(id, record);

        if self.queue_tx.send(QueuedWork { id, action }).is_err() {
            self.tasks
                .lock()
                .expect("task map lock poisoned")
                .remove(&id);
            return Err(EngineError::ProcessorStopped);
        }

        self.bus.publish(&EngineEvent::TaskQueued(TaskQueued {
            task_id: id,
            task_name: name,
            priority,
            queue_time: queued_at,
        }));
        Ok(id)
    }

    /// Start the worker pool. Idempotent.
    pub fn start_processing(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        for worker in 0..self.max_concurrent {
            let queue_rx = Arc::clone(&self.queue_rx);
            let tasks = Arc::clone(&self.tasks);
            let bus = Arc::clone(&self.bus);
            let active_count = Arc::clone(&self.active_count);
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            tokio::spawn(async move {
                debug!(worker, "background worker started");
                loop {
                    let work = {
                        let mut rx = queue_rx.lock().await;
                        tokio::select! {
                            _ = shutdown_rx.changed() => None,
                            work = rx.recv() => work,
                        }
                    };
                    let Some(work) = work else {
                        debug!(worker, "background worker stopping");
                        break;
                    };
                    Self::execute(work, &tasks, &bus, &active_count).await;
                }
            });
        }
    }

    /// Signal cooperative shutdown of the worker pool.
    ///
    /// Workers finish their in-flight task body and exit; queued tasks
    /// that were not dequeued stay Queued.
    pub fn stop_processing(&self) {
        let _ = self.shutdown_tx.send(true);
        self.started.store(false, Ordering::SeqCst);
    }

    /// Cancel a task that has not been dequeued yet.
    ///
    /// Returns true when the task was still Queued and is now Cancelled.
    /// Running tasks are never preempted; cancelling them returns false.
    pub fn cancel_task(&self, id: Uuid) -> bool {
        let mut tasks = self.tasks.lock().expect("task map lock poisoned");
        match tasks.get_mut(&id) {
            Some(task) if task.status == BackgroundTaskStatus::Queued => {
                task.status = BackgroundTaskStatus::Cancelled;
                task.finished_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Number of task bodies currently executing.
    pub fn active_task_count(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    /// The configured concurrency limit.
    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent
    }

    /// Snapshot of one task's bookkeeping.
    pub fn task(&self, id: Uuid) -> Option<BackgroundTask> {
        self.tasks
            .lock()
            .expect("task map lock poisoned")
            .get(&id)
            .cloned()
    }

    /// Counts by status.
    pub fn statistics(&self) -> ProcessorStatistics {
        let tasks = self.tasks.lock().expect("task map lock poisoned");
        let mut stats = ProcessorStatistics::default();
        for task in tasks.values() {
            match task.status {
                BackgroundTaskStatus::Queued => stats.queued += 1,
                BackgroundTaskStatus::Running => stats.running += 1,
                BackgroundTaskStatus::Completed => stats.completed += 1,
                BackgroundTaskStatus::Failed => stats.failed += 1,
                BackgroundTaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    async fn execute(
        work: QueuedWork,
        tasks: &Arc<Mutex<HashMap<Uuid, BackgroundTask>>>,
        bus: &Arc<EventBus>,
        active_count: &Arc<AtomicUsize>,
    ) {
        let name = {
            let mut map = tasks.lock().expect("task map lock poisoned");
            match map.get_mut(&work.id) {
                // Cancelled while queued: drop without running
                Some(task) if task.status == BackgroundTaskStatus::Cancelled => return,
                Some(task) => {
                    task.status = BackgroundTaskStatus::Running;
                    task.started_at = Some(Utc::now());
                    task.name.clone()
                }
                None => return,
            }
        };
        active_count.fetch_add(1, Ordering::SeqCst);

        let action = work.action;
        let outcome = tokio::task::spawn_blocking(action).await;
        let outcome = match outcome {
            Ok(result) => result,
            Err(join_error) => Err(format!("task panicked: {join_error}")),
        };

        active_count.fetch_sub(1, Ordering::SeqCst);
        let finished_at = Utc::now();

        let duration_ms = {
            let mut map = tasks.lock().expect("task map lock poisoned");
            let task = map.get_mut(&work.id);
            let duration_ms = task
                .as_ref()
                .and_then(|t| t.started_at)
                .map(|started| (finished_at - started).num_milliseconds().max(0) as u64)
                .unwrap_or(0);
            if let Some(task) = task {
                task.finished_at = Some(finished_at);
                match &outcome {
                    Ok(value) => {
                        task.status = BackgroundTaskStatus::Completed;
                        task.result = Some(value.clone());
                    }
                    Err(message) => {
                        task.status = BackgroundTaskStatus::Failed;
                        task.error = Some(message.clone());
                    }
                }
            }
            duration_ms
        };

        match outcome {
            Ok(result) => {
                bus.publish(&EngineEvent::TaskCompleted(TaskCompleted {
                    task_id: work.id,
                    task_name: name,
                    result,
                    duration_ms,
                }));
            }
            Err(message) => {
                error!(task = %name, error = %message, "background task failed");
                bus.publish(&EngineEvent::TaskFailed(TaskFailed {
                    task_id: work.id,
                    task_name: name,
                    error: message,
                    duration_ms,
                }));
            }
        }
    }
}
