// Integration tests for the background runtime: worker pool, event
// flow, performance tracking, and resource pools working together.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskdeck::background::{
    BackgroundProcessor, BackgroundTaskStatus, MemoryPool, PerformanceMonitor, ResourceManager,
    TaskPriority,
};
use taskdeck::bus::EventBus;
use taskdeck::config::EngineConfig;
use taskdeck::events::{EngineEvent, EventKind};

async fn wait_until<F: Fn() -> bool>(predicate: F) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_worker_pool_drains_queue_within_limit() {
    common::init_tracing();
    let config = EngineConfig::new().with_max_concurrent_tasks(3);
    let bus = Arc::new(EventBus::new());
    let processor = Arc::new(BackgroundProcessor::new(
        config.max_concurrent_tasks,
        Arc::clone(&bus),
    ));
    processor.start_processing();

    for i in 0..12 {
        processor
            .queue_task(
                format!("job-{i}"),
                Box::new(move || {
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(serde_json::json!({ "job": i }))
                }),
            )
            .unwrap();
        // The limit holds at every observable instant
        assert!(processor.active_task_count() <= 3);
    }

    wait_until(|| processor.statistics().completed == 12).await;
    assert_eq!(processor.active_task_count(), 0);
}

#[tokio::test]
async fn test_completion_events_reach_subscribers() {
    let bus = Arc::new(EventBus::new());
    let completed = Arc::new(Mutex::new(Vec::new()));
    let completed_clone = Arc::clone(&completed);
    bus.subscribe(EventKind::TaskCompleted, move |event| {
        if let EngineEvent::TaskCompleted(done) = event {
            completed_clone
                .lock()
                .unwrap()
                .push((done.task_name.clone(), done.result.clone()));
        }
    });

    let processor = BackgroundProcessor::new(2, Arc::clone(&bus));
    processor.start_processing();

    let id = processor
        .queue_task("export", Box::new(|| Ok(serde_json::json!({"rows": 10}))))
        .unwrap();

    wait_until(|| {
        processor
            .task(id)
            .map(|t| t.status.is_terminal())
            .unwrap_or(false)
    })
    .await;
    // publish runs on the worker before the status flips, but give the
    // subscriber list a moment regardless
    wait_until(|| !completed.lock().unwrap().is_empty()).await;

    let completed = completed.lock().unwrap();
    assert_eq!(completed[0].0, "export");
    assert_eq!(completed[0].1, serde_json::json!({"rows": 10}));
}

#[tokio::test]
async fn test_queue_order_is_fifo_with_single_worker() {
    let bus = Arc::new(EventBus::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let processor = BackgroundProcessor::new(1, bus);
    processor.start_processing();

    let mut last = None;
    for i in 0..5 {
        let order_clone = Arc::clone(&order);
        last = Some(
            processor
                .queue_task(
                    format!("step-{i}"),
                    Box::new(move || {
                        order_clone.lock().unwrap().push(i);
                        Ok(serde_json::Value::Null)
                    }),
                )
                .unwrap(),
        );
    }

    let last = last.unwrap();
    wait_until(|| {
        processor
            .task(last)
            .map(|t| t.status.is_terminal())
            .unwrap_or(false)
    })
    .await;

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_cancelled_task_never_runs() {
    let bus = Arc::new(EventBus::new());
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = Arc::clone(&ran);

    let processor = BackgroundProcessor::new(1, bus);
    let id = processor
        .queue_task(
            "doomed",
            Box::new(move || {
                ran_clone.fetch_add(1, Ordering::SeqCst);
                Ok(serde_json::Value::Null)
            }),
        )
        .unwrap();
    assert!(processor.cancel_task(id));

    processor.start_processing();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(
        processor.task(id).unwrap().status,
        BackgroundTaskStatus::Cancelled
    );
}

#[tokio::test]
async fn test_priority_recorded_on_task_and_event() {
    let bus = Arc::new(EventBus::new());
    let priorities = Arc::new(Mutex::new(Vec::new()));
    let priorities_clone = Arc::clone(&priorities);
    bus.subscribe(EventKind::TaskQueued, move |event| {
        if let EngineEvent::TaskQueued(queued) = event {
            priorities_clone.lock().unwrap().push(queued.priority);
        }
    });

    let processor = BackgroundProcessor::new(1, bus);
    let id = processor
        .queue_task_with_priority(
            "urgent-sync",
            TaskPriority::High,
            Box::new(|| Ok(serde_json::Value::Null)),
        )
        .unwrap();

    assert_eq!(processor.task(id).unwrap().priority, TaskPriority::High);
    assert_eq!(*priorities.lock().unwrap(), vec![TaskPriority::High]);
}

#[tokio::test]
async fn test_slow_background_work_flagged_by_monitor() {
    let bus = Arc::new(EventBus::new());
    let bottlenecks = Arc::new(AtomicUsize::new(0));
    let bottlenecks_clone = Arc::clone(&bottlenecks);
    bus.subscribe(EventKind::PerformanceBottleneck, move |_| {
        bottlenecks_clone.fetch_add(1, Ordering::SeqCst);
    });

    let config = EngineConfig::new().with_bottleneck_threshold(10);
    let monitor = Arc::new(PerformanceMonitor::new(
        Arc::clone(&bus),
        Duration::from_millis(config.bottleneck_threshold_ms),
        config.frame_window,
    ));

    let processor = BackgroundProcessor::new(1, bus);
    processor.start_processing();

    let monitor_clone = Arc::clone(&monitor);
    let id = processor
        .queue_task(
            "slow-import",
            Box::new(move || {
                monitor_clone.start_tracking("import");
                std::thread::sleep(Duration::from_millis(50));
                monitor_clone.stop_tracking("import");
                Ok(serde_json::Value::Null)
            }),
        )
        .unwrap();

    wait_until(|| {
        processor
            .task(id)
            .map(|t| t.status.is_terminal())
            .unwrap_or(false)
    })
    .await;

    assert_eq!(bottlenecks.load(Ordering::SeqCst), 1);
    assert!(monitor.last_metric("import").unwrap().duration_ms >= 50);
}

#[tokio::test]
async fn test_pool_checkout_from_worker_tasks() {
    let bus = Arc::new(EventBus::new());
    let pool = Arc::new(MemoryPool::new("scratch", 2, || Vec::<u8>::with_capacity(256)));

    let processor = Arc::new(BackgroundProcessor::new(2, bus));
    processor.start_processing();

    let mut ids = Vec::new();
    for _ in 0..6 {
        let pool_clone = Arc::clone(&pool);
        let id = processor
            .queue_task(
                "buffered",
                Box::new(move || {
                    let mut buffer = pool_clone
                        .checkout()
                        .map_err(|e| e.to_string())?;
                    buffer.extend_from_slice(b"payload");
                    buffer.clear();
                    pool_clone.give_back(buffer).map_err(|e| e.to_string())?;
                    Ok(serde_json::Value::Null)
                }),
            )
            .unwrap();
        ids.push(id);
    }

    wait_until(|| processor.statistics().completed == 6).await;
    assert_eq!(pool.available(), 2);
    assert_eq!(pool.in_use(), 0);
}

#[tokio::test]
async fn test_resource_sweep_after_background_work() {
    let bus = Arc::new(EventBus::new());
    let manager = ResourceManager::new(Arc::clone(&bus));

    manager.create_resource("import-handle");
    manager.mark_unused("import-handle").unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.cleanup_unused(Duration::from_millis(5)), 1);
    assert_eq!(manager.tracked_count(), 0);
}
