//! Filter/sort/query engine.
//!
//! Holds the ordered filter list and optional sorter, evaluates them
//! against a [`VirtualDataSource`] with AND semantics, and caches results
//! in two layers: an external [`CacheManager`] (TTL'd, shared, pattern
//! invalidatable) and an internal single-slot cache keyed by the same
//! string. Filter/sorter mutation invalidates the internal slot and
//! publishes `FiltersChanged`.

use std::sync::Arc;

use tracing::debug;

use crate::bus::EventBus;
use crate::cache::CacheManager;
use crate::data_source::VirtualDataSource;
use crate::events::{EngineEvent, FilterResultsChanged, FiltersChanged};
use crate::filter::{parse_query, SortSpec, TaskFilter};
use crate::models::Task;

/// TTL for externally cached result sets, in seconds.
const RESULT_CACHE_TTL_SECS: u64 = 300;
/// Cache level tag for raw result sets.
const RESULT_CACHE_LEVEL: &str = "L1";

/// Composes filters and a sorter over a data source, with result
/// caching.
pub struct FilterEngine {
    filters: Vec<TaskFilter>,
    sorter: Option<SortSpec>,
    cache: Option<Arc<CacheManager>>,
    bus: Arc<EventBus>,
    /// Single-slot result cache: (cache key, result set).
    last_result: Option<(String, Vec<Task>)>,
}

impl FilterEngine {
    /// Create an engine without an external cache layer.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            filters: Vec::new(),
            sorter: None,
            cache: None,
            bus,
            last_result: None,
        }
    }

    /// Attach an external cache layer.
    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Number of top-level filters installed.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Canonical string form of each installed filter, in order.
    pub fn active_filters(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.cache_key()).collect()
    }

    /// Size of the most recently computed result set, if the internal
    /// slot is warm. Status displays read this without re-running the
    /// query.
    pub fn last_result_count(&self) -> Option<usize> {
        self.last_result.as_ref().map(|(_, results)| results.len())
    }

    /// Append a filter.
    pub fn add_filter(&mut self, filter: TaskFilter) {
        self.filters.push(filter);
        self.on_filters_changed();
    }

    /// Remove a filter by canonical key. Returns true if one was
    /// removed.
    pub fn remove_filter(&mut self, cache_key: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.cache_key() != cache_key);
        if self.filters.len() < before {
            self.on_filters_changed();
            true
        } else {
            false
        }
    }

    /// Remove every filter.
    pub fn clear_filters(&mut self) {
        if self.filters.is_empty() {
            return;
        }
        self.filters.clear();
        self.on_filters_changed();
    }

    /// Install or clear the sorter. Invalidates the result cache slot.
    pub fn set_sorter(&mut self, sorter: Option<SortSpec>) {
        self.sorter = sorter;
        self.last_result = None;
    }

    /// Current sorter, if any.
    pub fn sorter(&self) -> Option<SortSpec> {
        self.sorter
    }

    /// Parse a query string and install the parsed filters as one atomic
    /// replacement of the current set.
    ///
    /// Invalid tokens are skipped by the parser; the installed set is
    /// whatever parsed cleanly (possibly empty).
    pub fn apply_query(&mut self, query: &str) {
        self.filters = parse_query(query);
        self.on_filters_changed();
    }

    /// Cache key for the current filter + sorter configuration.
    pub fn cache_key(&self) -> String {
        let filter_part = if self.filters.is_empty() {
            "all".to_string()
        } else {
            self.active_filters().join("|")
        };
        let sort_part = self
            .sorter
            .map(|s| s.cache_key())
            .unwrap_or_else(|| "nosort".to_string());
        format!("query:{filter_part}|{sort_part}")
    }

    /// Evaluate the current configuration against the data source.
    ///
    /// Checks the external cache, then the internal slot; on a full miss
    /// it scans the source's total range applying all filters with AND
    /// semantics (an empty filter list returns everything), applies the
    /// sorter, stores into both layers, and publishes
    /// `FilterResultsChanged`.
    pub fn get_filtered_results(&mut self, source: &VirtualDataSource) -> Vec<Task> {
        let key = self.cache_key();

        if let Some(cache) = &self.cache {
            if let Some(results) = cache.get::<Vec<Task>>(&key) {
                debug!(key, count = results.len(), "filter results served from cache");
                return results;
            }
        }
        if let Some((cached_key, results)) = &self.last_result {
            if *cached_key == key {
                return results.clone();
            }
        }

        let total_count = source.total_count();
        let mut results: Vec<Task> = source
            .range(0, total_count)
            .into_iter()
            .filter(|task| self.filters.iter().all(|f| f.matches(task)))
            .collect();

        if let Some(sorter) = self.sorter {
            results.sort_by(|a, b| sorter.compare(a, b));
        }

        if let Some(cache) = &self.cache {
            cache.set(&key, &results, RESULT_CACHE_TTL_SECS, RESULT_CACHE_LEVEL);
        }
        self.last_result = Some((key, results.clone()));

        self.bus
            .publish(&EngineEvent::FilterResultsChanged(FilterResultsChanged {
                result_count: results.len(),
                total_count,
                filter_count: self.filters.len(),
            }));

        results
    }

    fn on_filters_changed(&mut self) {
        self.last_result = None;
        self.bus.publish(&EngineEvent::FiltersChanged(FiltersChanged {
            filter_count: self.filters.len(),
            filters: self.active_filters(),
        }));
    }
}
