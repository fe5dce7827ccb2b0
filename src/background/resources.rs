//! Reusable object pools and idle-resource cleanup.
//!
//! [`MemoryPool`] keeps a fixed-capacity pool of reusable items (line
//! buffers, scratch vectors) so hot paths avoid reallocation.
//! [`ResourceManager`] tracks ad hoc resources by id and sweeps the ones
//! that have sat unused past an idle cutoff.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::bus::EventBus;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, ResourcesCleanedUp};

struct PoolState<T> {
    available: Vec<T>,
    in_use: usize,
}

/// Fixed-capacity pool of reusable items.
///
/// Items are pre-allocated up front via the factory; checkout hands one
/// out and give-back returns it for reuse. The pool never holds more
/// than `max_size` items in total.
pub struct MemoryPool<T> {
    name: String,
    max_size: usize,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    state: Mutex<PoolState<T>>,
}

impl<T> MemoryPool<T> {
    /// Create a pool named `name` holding up to `max_size` items, all
    /// pre-allocated from `factory`.
    pub fn new(
        name: impl Into<String>,
        max_size: usize,
        factory: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        let max_size = max_size.max(1);
        let available = (0..max_size).map(|_| factory()).collect();
        Self {
            name: name.into(),
            max_size,
            factory: Box::new(factory),
            state: Mutex::new(PoolState {
                available,
                in_use: 0,
            }),
        }
    }

    /// Check out an item. Fails with [`EngineError::PoolExhausted`] when
    /// every item is already checked out.
    pub fn checkout(&self) -> EngineResult<T> {
        let mut state = self.state.lock().expect("pool lock poisoned");
        if let Some(item) = state.available.pop() {
            state.in_use += 1;
            return Ok(item);
        }
        if state.in_use < self.max_size {
            // Rebuild an item that was dropped instead of returned
            state.in_use += 1;
            return Ok((self.factory)());
        }
        Err(EngineError::PoolExhausted {
            pool: self.name.clone(),
            max_size: self.max_size,
        })
    }

    /// Return an item to the pool. Fails with
    /// [`EngineError::PoolOverflow`] when nothing is checked out.
    pub fn give_back(&self, item: T) -> EngineResult<()> {
        let mut state = self.state.lock().expect("pool lock poisoned");
        if state.in_use == 0 {
            return Err(EngineError::PoolOverflow {
                pool: self.name.clone(),
            });
        }
        state.in_use -= 1;
        state.available.push(item);
        Ok(())
    }

    /// Items free for checkout.
    pub fn available(&self) -> usize {
        self.state.lock().expect("pool lock poisoned").available.len()
    }

    /// Items currently checked out.
    pub fn in_use(&self) -> usize {
        self.state.lock().expect("pool lock poisoned").in_use
    }

    /// The pool name, as used in errors.
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct TrackedResource {
    last_used: Instant,
    in_use: bool,
}

/// Tracks ad hoc resources by id and sweeps idle ones.
pub struct ResourceManager {
    bus: Arc<EventBus>,
    tracked: Mutex<HashMap<String, TrackedResource>>,
}

impl ResourceManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Register a resource as in use. Re-registering an existing id
    /// refreshes it.
    pub fn create_resource(&self, id: impl Into<String>) {
        self.tracked
            .lock()
            .expect("resource lock poisoned")
            .insert(
                id.into(),
                TrackedResource {
                    last_used: Instant::now(),
                    in_use: true,
                },
            );
    }

    /// Record that a resource was just used.
    pub fn touch(&self, id: &str) -> EngineResult<()> {
        let mut tracked = self.tracked.lock().expect("resource lock poisoned");
        let resource = tracked.get_mut(id).ok_or_else(|| EngineError::UnknownResource {
            id: id.to_string(),
        })?;
        resource.last_used = Instant::now();
        resource.in_use = true;
        Ok(())
    }

    /// Mark a resource as no longer in use, making it eligible for the
    /// idle sweep.
    pub fn mark_unused(&self, id: &str) -> EngineResult<()> {
        let mut tracked = self.tracked.lock().expect("resource lock poisoned");
        let resource = tracked.get_mut(id).ok_or_else(|| EngineError::UnknownResource {
            id: id.to_string(),
        })?;
        resource.in_use = false;
        resource.last_used = Instant::now();
        Ok(())
    }

    /// Drop a resource immediately, regardless of state.
    pub fn dispose(&self, id: &str) -> EngineResult<()> {
        self.tracked
            .lock()
            .expect("resource lock poisoned")
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EngineError::UnknownResource {
                id: id.to_string(),
            })
    }

    /// Remove every unused resource idle for longer than `max_idle`.
    ///
    /// Publishes [`ResourcesCleanedUp`] when anything was removed and
    /// returns the count.
    pub fn cleanup_unused(&self, max_idle: Duration) -> usize {
        let removed = {
            let mut tracked = self.tracked.lock().expect("resource lock poisoned");
            let before = tracked.len();
            tracked.retain(|_, resource| resource.in_use || resource.last_used.elapsed() <= max_idle);
            before - tracked.len()
        };

        if removed > 0 {
            debug!(removed, "swept idle resources");
            self.bus
                .publish(&EngineEvent::ResourcesCleanedUp(ResourcesCleanedUp {
                    resources_removed: removed,
                }));
        }
        removed
    }

    /// Number of tracked resources.
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().expect("resource lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pool_preallocates_and_checks_out() {
        let pool = MemoryPool::new("buffers", 3, || String::with_capacity(128));
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.in_use(), 0);

        let item = pool.checkout().unwrap();
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.in_use(), 1);

        pool.give_back(item).unwrap();
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_pool_exhaustion() {
        let pool = MemoryPool::new("small", 2, Vec::<u8>::new);
        let _a = pool.checkout().unwrap();
        let _b = pool.checkout().unwrap();

        match pool.checkout() {
            Err(EngineError::PoolExhausted { pool, max_size }) => {
                assert_eq!(pool, "small");
                assert_eq!(max_size, 2);
            }
            other => panic!("expected PoolExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_pool_overflow_on_spurious_return() {
        let pool = MemoryPool::new("strict", 2, Vec::<u8>::new);
        match pool.give_back(Vec::new()) {
            Err(EngineError::PoolOverflow { pool }) => assert_eq!(pool, "strict"),
            other => panic!("expected PoolOverflow, got {other:?}"),
        }
    }

    #[test]
    fn test_pool_rebuilds_dropped_items() {
        let pool = MemoryPool::new("lossy", 2, Vec::<u8>::new);
        let a = pool.checkout().unwrap();
        drop(a); // never returned
        let b = pool.checkout().unwrap();

        // One slot is gone until its give_back; the pool still serves
        // up to max_size concurrently-held items.
        assert_eq!(pool.in_use(), 2);
        assert!(pool.checkout().is_err());
        pool.give_back(b).unwrap();
        assert!(pool.checkout().is_ok());
    }

    #[test]
    fn test_resource_lifecycle() {
        let bus = Arc::new(EventBus::new());
        let manager = ResourceManager::new(bus);

        manager.create_resource("conn-1");
        assert_eq!(manager.tracked_count(), 1);

        manager.mark_unused("conn-1").unwrap();
        manager.touch("conn-1").unwrap();

        manager.dispose("conn-1").unwrap();
        assert_eq!(manager.tracked_count(), 0);
    }

    #[test]
    fn test_unknown_resource_errors() {
        let bus = Arc::new(EventBus::new());
        let manager = ResourceManager::new(bus);

        assert!(matches!(
            manager.touch("ghost"),
            Err(EngineError::UnknownResource { .. })
        ));
        assert!(matches!(
            manager.mark_unused("ghost"),
            Err(EngineError::UnknownResource { .. })
        ));
        assert!(matches!(
            manager.dispose("ghost"),
            Err(EngineError::UnknownResource { .. })
        ));
    }

    #[test]
    fn test_cleanup_removes_only_idle_unused() {
        let bus = Arc::new(EventBus::new());
        let events = Arc::new(AtomicUsize::new(0));
        let events_clone = Arc::clone(&events);
        bus.subscribe(EventKind::ResourcesCleanedUp, move |_| {
            events_clone.fetch_add(1, Ordering::SeqCst);
        });

        let manager = ResourceManager::new(bus);
        manager.create_resource("busy");
        manager.create_resource("idle");
        manager.mark_unused("idle").unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let removed = manager.cleanup_unused(Duration::from_millis(5));

        assert_eq!(removed, 1);
        assert_eq!(manager.tracked_count(), 1);
        assert!(manager.touch("busy").is_ok());
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cleanup_with_nothing_idle_publishes_nothing() {
        let bus = Arc::new(EventBus::new());
        let events = Arc::new(AtomicUsize::new(0));
        let events_clone = Arc::clone(&events);
        bus.subscribe(EventKind::ResourcesCleanedUp, move |_| {
            events_clone.fetch_add(1, Ordering::SeqCst);
        });

        let manager = ResourceManager::new(bus);
        manager.create_resource("busy");

        assert_eq!(manager.cleanup_unused(Duration::from_millis(1)), 0);
        assert_eq!(events.load(Ordering::SeqCst), 0);
    }
}
