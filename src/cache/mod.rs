//! Multi-level expiring key/value cache with memory-budget eviction.
//!
//! Entries carry a TTL and a free-form level tag (e.g. "L1" for raw query
//! results, "L2" for computed scalars, "L3" for formatted lines). Size is
//! estimated from a serialized approximation of the payload; an entry
//! whose own size exceeds the budget is never admitted. When committing
//! an entry would exceed the budget, the oldest-by-last-access entries
//! are evicted (at least one, and at least a quarter of the map per
//! round) until the entry fits.
//!
//! Expired entries are removed lazily on lookup, plus by an explicit
//! [`CacheManager::cleanup_expired_entries`] sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::events::{
    CacheCleanupCompleted, CacheEntryAdded, CacheEntryInvalidated, CacheEviction, EngineEvent,
};

/// One cached payload with bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: serde_json::Value,
    created_at: Instant,
    expires_at: Instant,
    level: String,
    size_bytes: usize,
    access_count: u64,
    last_access: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Memory usage snapshot for the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheMemoryUsage {
    /// Sum of estimated entry sizes in bytes.
    pub total_bytes: usize,
    /// Same figure in megabytes.
    pub total_mb: f64,
    /// Number of live entries.
    pub entry_count: usize,
}

/// Counter snapshot returned by [`CacheManager::statistics`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatistics {
    /// Lookups that returned a live entry.
    pub hits: u64,
    /// Lookups that found nothing (or an expired entry).
    pub misses: u64,
    /// Entries removed by budget eviction.
    pub evictions: u64,
    /// Total `get` calls.
    pub total_requests: u64,
    /// `hits / total_requests`, rounded to 3 decimals; 0.0 when no
    /// requests have been made.
    pub hit_rate: f64,
    /// Current memory usage.
    pub memory: CacheMemoryUsage,
}

/// Multi-level expiring cache with a hard memory budget.
///
/// Safe for concurrent use from background workers and the interactive
/// thread; statistics counters are atomic and the entry map sits behind
/// a mutex. Events are published after internal locks are released, so
/// subscribers may call back into the cache.
pub struct CacheManager {
    entries: Mutex<HashMap<String, CacheEntry>>,
    memory_budget: usize,
    bus: Arc<EventBus>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    total_requests: AtomicU64,
}

impl CacheManager {
    /// Create a cache with the given memory budget in bytes.
    pub fn new(memory_budget: usize, bus: Arc<EventBus>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            memory_budget,
            bus,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
        }
    }

    /// Store a value under `key` with the given TTL and level tag.
    ///
    /// Returns `true` when the entry was committed. Returns `false` only
    /// when the entry's own estimated size exceeds the memory budget (the
    /// cache is left untouched in that case); eviction that makes room
    /// still counts as success.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64, level: &str) -> bool {
        let data = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "cache set skipped: payload not serializable");
                return false;
            }
        };
        // Serialized approximation of the payload size.
        let size_bytes = data.to_string().len();
        if size_bytes > self.memory_budget {
            debug!(
                key,
                size_bytes,
                budget = self.memory_budget,
                "cache set rejected: entry exceeds memory budget"
            );
            return false;
        }

        let now = Instant::now();
        let entry = CacheEntry {
            data,
            created_at: now,
            expires_at: now + Duration::from_secs(ttl_secs),
            level: level.to_string(),
            size_bytes,
            access_count: 0,
            last_access: now,
        };

        let mut pending_events = Vec::new();
        {
            let mut map = self.entries.lock().expect("cache lock poisoned");
            // Replacing an existing entry frees its size first.
            map.remove(key);

            while Self::used_bytes(&map) + size_bytes > self.memory_budget && !map.is_empty() {
                let removed = self.evict_oldest_round(&mut map);
                pending_events.push(EngineEvent::CacheEviction(CacheEviction {
                    entries_removed: removed,
                    reason: "memory budget exceeded".to_string(),
                }));
            }

            map.insert(key.to_string(), entry);
        }

        for event in pending_events {
            self.bus.publish(&event);
        }
        self.bus.publish(&EngineEvent::CacheEntryAdded(CacheEntryAdded {
            key: key.to_string(),
            level: level.to_string(),
            size_bytes,
            ttl_secs,
        }));
        true
    }

    /// Look up a value by key.
    ///
    /// Misses (including entries found expired, which are removed on the
    /// spot) return `None`. A payload that does not deserialize as `T`
    /// also counts as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        let data = {
            let mut map = self.entries.lock().expect("cache lock poisoned");
            match map.get_mut(key) {
                Some(entry) if entry.is_expired(now) => {
                    map.remove(key);
                    None
                }
                Some(entry) => {
                    entry.access_count += 1;
                    entry.last_access = now;
                    Some(entry.data.clone())
                }
                None => None,
            }
        };

        match data {
            Some(value) => match serde_json::from_value(value) {
                Ok(typed) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Some(typed)
                }
                Err(e) => {
                    warn!(key, error = %e, "cached payload failed to deserialize");
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remove one entry. Returns true if it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = {
            let mut map = self.entries.lock().expect("cache lock poisoned");
            map.remove(key).is_some()
        };
        if removed {
            self.bus
                .publish(&EngineEvent::CacheEntryInvalidated(CacheEntryInvalidated {
                    key: key.to_string(),
                }));
        }
        removed
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) -> usize {
        let keys: Vec<String> = {
            let mut map = self.entries.lock().expect("cache lock poisoned");
            let keys = map.keys().cloned().collect();
            map.clear();
            keys
        };
        for key in &keys {
            self.bus
                .publish(&EngineEvent::CacheEntryInvalidated(CacheEntryInvalidated {
                    key: key.clone(),
                }));
        }
        keys.len()
    }

    /// Remove entries whose keys match a glob pattern (`*` matches any
    /// run of characters, `?` a single character). Returns the number
    /// removed.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let regex = match Self::glob_to_regex(pattern) {
            Ok(r) => r,
            Err(e) => {
                warn!(pattern, error = %e, "invalid cache invalidation pattern");
                return 0;
            }
        };

        let keys: Vec<String> = {
            let mut map = self.entries.lock().expect("cache lock poisoned");
            let keys: Vec<String> = map
                .keys()
                .filter(|k| regex.is_match(k))
                .cloned()
                .collect();
            for key in &keys {
                map.remove(key);
            }
            keys
        };
        for key in &keys {
            self.bus
                .publish(&EngineEvent::CacheEntryInvalidated(CacheEntryInvalidated {
                    key: key.clone(),
                }));
        }
        keys.len()
    }

    /// Remove every expired entry that lazy lookup has not hit yet.
    ///
    /// Returns the number removed and publishes a cleanup event.
    pub fn cleanup_expired_entries(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut map = self.entries.lock().expect("cache lock poisoned");
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired(now));
            before - map.len()
        };
        self.bus
            .publish(&EngineEvent::CacheCleanupCompleted(CacheCleanupCompleted {
                entries_removed: removed,
            }));
        removed
    }

    /// Counter and memory snapshot.
    pub fn statistics(&self) -> CacheStatistics {
        let hits = self.hits.load(Ordering::Relaxed);
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            ((hits as f64 / total_requests as f64) * 1000.0).round() / 1000.0
        };
        CacheStatistics {
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_requests,
            hit_rate,
            memory: self.memory_usage(),
        }
    }

    /// Current memory usage.
    pub fn memory_usage(&self) -> CacheMemoryUsage {
        let map = self.entries.lock().expect("cache lock poisoned");
        let total_bytes = Self::used_bytes(&map);
        CacheMemoryUsage {
            total_bytes,
            total_mb: total_bytes as f64 / (1024.0 * 1024.0),
            entry_count: map.len(),
        }
    }

    /// Live entry count per level tag.
    pub fn level_counts(&self) -> HashMap<String, usize> {
        let map = self.entries.lock().expect("cache lock poisoned");
        let mut counts = HashMap::new();
        for entry in map.values() {
            *counts.entry(entry.level.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Age of an entry since creation, if present.
    pub fn entry_age(&self, key: &str) -> Option<Duration> {
        let map = self.entries.lock().expect("cache lock poisoned");
        map.get(key).map(|e| e.created_at.elapsed())
    }

    fn used_bytes(map: &HashMap<String, CacheEntry>) -> usize {
        map.values().map(|e| e.size_bytes).sum()
    }

    /// Remove the oldest-by-last-access entries: at least one, and at
    /// least a quarter of the current map. Returns how many were removed.
    fn evict_oldest_round(&self, map: &mut HashMap<String, CacheEntry>) -> usize {
        let mut by_age: Vec<(String, Instant)> = map
            .iter()
            .map(|(k, e)| (k.clone(), e.last_access))
            .collect();
        by_age.sort_by_key(|(_, last_access)| *last_access);

        let count = (map.len() / 4).max(1).min(by_age.len());
        for (key, _) in by_age.into_iter().take(count) {
            map.remove(&key);
        }
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
        let mut translated = String::with_capacity(pattern.len() + 8);
        translated.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                other => translated.push_str(&regex::escape(&other.to_string())),
            }
        }
        translated.push('$');
        Regex::new(&translated)
    }
}
