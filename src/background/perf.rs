//! Operation timing, frame-rate sampling, and memory readings.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sysinfo::System;
use tracing::warn;

use crate::bus::EventBus;
use crate::events::{EngineEvent, PerformanceBottleneck, PerformanceMetric};

/// Process and system memory at one point in time, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    /// Resident memory of this process.
    pub process_bytes: u64,
    /// Total physical memory.
    pub total_system_bytes: u64,
    /// Used physical memory.
    pub used_system_bytes: u64,
}

struct InflightOperation {
    started: Instant,
    memory_at_start: u64,
}

/// Tracks named operations and render frames, flagging slow operations
/// over the event bus.
pub struct PerformanceMonitor {
    bus: Arc<EventBus>,
    bottleneck_threshold: Duration,
    frame_window: usize,
    inflight: Mutex<HashMap<String, InflightOperation>>,
    last_metrics: Mutex<HashMap<String, PerformanceMetric>>,
    frames: Mutex<VecDeque<Instant>>,
    system: Mutex<System>,
}

impl PerformanceMonitor {
    /// Create a monitor. Operations longer than `bottleneck_threshold`
    /// publish a [`PerformanceBottleneck`] event; `frame_window` bounds
    /// the frame-time sample buffer.
    pub fn new(bus: Arc<EventBus>, bottleneck_threshold: Duration, frame_window: usize) -> Self {
        Self {
            bus,
            bottleneck_threshold,
            frame_window: frame_window.max(2),
            inflight: Mutex::new(HashMap::new()),
            last_metrics: Mutex::new(HashMap::new()),
            frames: Mutex::new(VecDeque::new()),
            system: Mutex::new(System::new()),
        }
    }

    /// Begin timing a named operation. Starting the same name twice
    /// restarts the measurement.
    pub fn start_tracking(&self, operation: impl Into<String>) {
        let entry = InflightOperation {
            started: Instant::now(),
            memory_at_start: self.get_memory_usage().process_bytes,
        };
        self.inflight
            .lock()
            .expect("inflight lock poisoned")
            .insert(operation.into(), entry);
    }

    /// Finish timing a named operation.
    ///
    /// Publishes a [`PerformanceMetric`] and, when the duration crossed
    /// the threshold, a [`PerformanceBottleneck`]. Returns `None` when
    /// the operation was never started.
    pub fn stop_tracking(&self, operation: &str) -> Option<PerformanceMetric> {
        let entry = self
            .inflight
            .lock()
            .expect("inflight lock poisoned")
            .remove(operation)?;

        let elapsed = entry.started.elapsed();
        let memory_now = self.get_memory_usage().process_bytes;
        let metric = PerformanceMetric {
            operation: operation.to_string(),
            duration_ms: elapsed.as_millis() as u64,
            memory_delta_bytes: memory_now as i64 - entry.memory_at_start as i64,
        };

        self.last_metrics
            .lock()
            .expect("metrics lock poisoned")
            .insert(operation.to_string(), metric.clone());
        self.bus
            .publish(&EngineEvent::PerformanceMetric(metric.clone()));

        if elapsed > self.bottleneck_threshold {
            warn!(
                operation,
                duration_ms = metric.duration_ms,
                "operation exceeded bottleneck threshold"
            );
            self.bus
                .publish(&EngineEvent::PerformanceBottleneck(PerformanceBottleneck {
                    operation: operation.to_string(),
                    duration_ms: metric.duration_ms,
                    memory_usage_bytes: memory_now,
                }));
        }

        Some(metric)
    }

    /// Most recent metric recorded for an operation name.
    pub fn last_metric(&self, operation: &str) -> Option<PerformanceMetric> {
        self.last_metrics
            .lock()
            .expect("metrics lock poisoned")
            .get(operation)
            .cloned()
    }

    /// Record that a render frame finished now. The sample buffer keeps
    /// only the most recent `frame_window` timestamps.
    pub fn record_frame(&self) {
        let mut frames = self.frames.lock().expect("frames lock poisoned");
        frames.push_back(Instant::now());
        while frames.len() > self.frame_window {
            frames.pop_front();
        }
    }

    /// Average frames per second over the sample window.
    ///
    /// Returns 0.0 until at least two frames have been recorded.
    pub fn average_fps(&self) -> f64 {
        let frames = self.frames.lock().expect("frames lock poisoned");
        if frames.len() < 2 {
            return 0.0;
        }
        let span = frames
            .back()
            .expect("non-empty")
            .duration_since(*frames.front().expect("non-empty"));
        if span.is_zero() {
            return 0.0;
        }
        (frames.len() - 1) as f64 / span.as_secs_f64()
    }

    /// Current memory readings for this process and the host.
    pub fn get_memory_usage(&self) -> MemoryUsage {
        let mut system = self.system.lock().expect("system lock poisoned");
        system.refresh_memory();

        let process_bytes = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| {
                system.refresh_process(pid);
                system.process(pid).map(|process| process.memory())
            })
            .unwrap_or(0);

        MemoryUsage {
            process_bytes,
            total_system_bytes: system.total_memory(),
            used_system_bytes: system.used_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn monitor_with_threshold(threshold: Duration) -> (Arc<EventBus>, PerformanceMonitor) {
        let bus = Arc::new(EventBus::new());
        let monitor = PerformanceMonitor::new(Arc::clone(&bus), threshold, 60);
        (bus, monitor)
    }

    #[test]
    fn test_tracked_operation_produces_metric() {
        let (bus, monitor) = monitor_with_threshold(Duration::from_secs(10));
        let metrics = Arc::new(AtomicUsize::new(0));
        let metrics_clone = Arc::clone(&metrics);
        bus.subscribe(EventKind::PerformanceMetric, move |_| {
            metrics_clone.fetch_add(1, Ordering::SeqCst);
        });

        monitor.start_tracking("filter_apply");
        thread::sleep(Duration::from_millis(20));
        let metric = monitor.stop_tracking("filter_apply").unwrap();

        assert_eq!(metric.operation, "filter_apply");
        assert!(metric.duration_ms >= 20);
        assert_eq!(metrics.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.last_metric("filter_apply"), Some(metric));
    }

    #[test]
    fn test_stop_without_start_returns_none() {
        let (_bus, monitor) = monitor_with_threshold(Duration::from_secs(10));
        assert!(monitor.stop_tracking("never-started").is_none());
    }

    #[test]
    fn test_slow_operation_flagged_as_bottleneck() {
        let (bus, monitor) = monitor_with_threshold(Duration::from_millis(10));
        let bottlenecks = Arc::new(AtomicUsize::new(0));
        let bottlenecks_clone = Arc::clone(&bottlenecks);
        bus.subscribe(EventKind::PerformanceBottleneck, move |_| {
            bottlenecks_clone.fetch_add(1, Ordering::SeqCst);
        });

        monitor.start_tracking("slow_scan");
        thread::sleep(Duration::from_millis(30));
        monitor.stop_tracking("slow_scan");

        assert_eq!(bottlenecks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fast_operation_not_flagged() {
        let (bus, monitor) = monitor_with_threshold(Duration::from_secs(10));
        let bottlenecks = Arc::new(AtomicUsize::new(0));
        let bottlenecks_clone = Arc::clone(&bottlenecks);
        bus.subscribe(EventKind::PerformanceBottleneck, move |_| {
            bottlenecks_clone.fetch_add(1, Ordering::SeqCst);
        });

        monitor.start_tracking("quick");
        monitor.stop_tracking("quick");

        assert_eq!(bottlenecks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_average_fps_needs_two_frames() {
        let (_bus, monitor) = monitor_with_threshold(Duration::from_secs(10));
        assert_eq!(monitor.average_fps(), 0.0);
        monitor.record_frame();
        assert_eq!(monitor.average_fps(), 0.0);
    }

    #[test]
    fn test_average_fps_over_window() {
        let (_bus, monitor) = monitor_with_threshold(Duration::from_secs(10));
        for _ in 0..5 {
            monitor.record_frame();
            thread::sleep(Duration::from_millis(10));
        }
        let fps = monitor.average_fps();
        // 10ms between frames is ~100fps; leave slack for scheduling
        assert!(fps > 20.0 && fps < 150.0, "fps was {fps}");
    }

    #[test]
    fn test_frame_window_is_bounded() {
        let bus = Arc::new(EventBus::new());
        let monitor = PerformanceMonitor::new(bus, Duration::from_secs(10), 4);
        for _ in 0..20 {
            monitor.record_frame();
        }
        let frames = monitor.frames.lock().unwrap();
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn test_memory_usage_readings_present() {
        let (_bus, monitor) = monitor_with_threshold(Duration::from_secs(10));
        let usage = monitor.get_memory_usage();
        assert!(usage.total_system_bytes > 0);
        assert!(usage.used_system_bytes <= usage.total_system_bytes);
    }
}
