//! Thread-safe publish/subscribe hub.
//!
//! The bus is the coordination backbone of the engine: the cache, filter
//! engine, viewport, and background processor all publish here, and
//! anything interested (status displays, invalidation hooks) subscribes.
//!
//! Publishing snapshots the subscriber list under a read lock and then
//! invokes callbacks *outside* any lock, so a callback may itself
//! subscribe, unsubscribe, or publish without deadlocking. A panicking
//! subscriber is caught and logged; remaining subscribers still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::error;

use crate::events::{EngineEvent, EventKind};

/// Subscriber callback. Invoked synchronously on the publishing thread
/// (or on a worker thread for [`EventBus::publish_async`]).
pub type EventCallback = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]; pass back to
/// [`EventBus::unsubscribe`] to remove the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// The event kind this subscription listens for.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct Subscriber {
    id: u64,
    callback: EventCallback,
}

/// Thread-safe publish/subscribe hub keyed by [`EventKind`].
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for one event kind.
    ///
    /// Callbacks for the same kind run in subscription order on each
    /// synchronous publish.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut map = self.subscribers.write().expect("subscriber lock poisoned");
        map.entry(kind).or_default().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        Subscription { kind, id }
    }

    /// Remove a previously registered callback.
    ///
    /// Returns true if the subscription was still registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut map = self.subscribers.write().expect("subscriber lock poisoned");
        if let Some(list) = map.get_mut(&subscription.kind) {
            let before = list.len();
            list.retain(|s| s.id != subscription.id);
            return list.len() < before;
        }
        false
    }

    /// Number of callbacks currently registered for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .expect("subscriber lock poisoned")
            .get(&kind)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// Publish synchronously: every current subscriber runs on the calling
    /// thread, in subscription order, before this returns.
    pub fn publish(&self, event: &EngineEvent) {
        for callback in self.snapshot(event.kind()) {
            Self::invoke(&callback, event);
        }
    }

    /// Publish asynchronously: each subscriber runs on its own worker
    /// thread. No ordering guarantee across subscribers; the publisher
    /// does not wait.
    pub fn publish_async(&self, event: EngineEvent) {
        let callbacks = self.snapshot(event.kind());
        if callbacks.is_empty() {
            return;
        }
        let event = Arc::new(event);
        for callback in callbacks {
            let event = Arc::clone(&event);
            std::thread::spawn(move || {
                Self::invoke(&callback, &event);
            });
        }
    }

    /// Snapshot callbacks for a kind under the read lock. Callbacks are
    /// invoked after the lock is released.
    fn snapshot(&self, kind: EventKind) -> Vec<EventCallback> {
        self.subscribers
            .read()
            .expect("subscriber lock poisoned")
            .get(&kind)
            .map(|list| list.iter().map(|s| Arc::clone(&s.callback)).collect())
            .unwrap_or_default()
    }

    /// Run one callback, isolating panics so the remaining subscribers
    /// and the publisher are unaffected.
    fn invoke(callback: &EventCallback, event: &EngineEvent) {
        let result = catch_unwind(AssertUnwindSafe(|| callback(event)));
        if result.is_err() {
            error!(kind = ?event.kind(), "event subscriber panicked; continuing");
        }
    }
}
