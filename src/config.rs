//! Engine configuration.
//!
//! This module defines [`EngineConfig`], the tunables shared by the cache,
//! background processor, and performance monitor.
//!
//! # Example
//!
//! ```ignore
//! use taskdeck::config::EngineConfig;
//!
//! let config = EngineConfig::default()
//!     .with_cache_memory_budget(10 * 1024 * 1024)
//!     .with_max_concurrent_tasks(2);
//! ```

use serde::{Deserialize, Serialize};

/// Tunables for the engine subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cache memory budget in bytes (default: 50 MB).
    pub cache_memory_budget: usize,
    /// Default TTL for cache entries in seconds (default: 300).
    pub cache_default_ttl_secs: u64,
    /// Maximum number of background task bodies running at once (default: 4).
    pub max_concurrent_tasks: usize,
    /// Operations slower than this are flagged as bottlenecks, in
    /// milliseconds (default: 100).
    pub bottleneck_threshold_ms: u64,
    /// Number of inter-frame samples kept for FPS averaging (default: 60).
    pub frame_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_memory_budget: 50 * 1024 * 1024,
            cache_default_ttl_secs: 300,
            max_concurrent_tasks: 4,
            bottleneck_threshold_ms: 100,
            frame_window: 60,
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache memory budget in bytes.
    pub fn with_cache_memory_budget(mut self, bytes: usize) -> Self {
        self.cache_memory_budget = bytes;
        self
    }

    /// Set the default cache TTL in seconds.
    pub fn with_cache_default_ttl(mut self, secs: u64) -> Self {
        self.cache_default_ttl_secs = secs;
        self
    }

    /// Set the background concurrency limit.
    pub fn with_max_concurrent_tasks(mut self, count: usize) -> Self {
        self.max_concurrent_tasks = count;
        self
    }

    /// Set the bottleneck threshold in milliseconds.
    pub fn with_bottleneck_threshold(mut self, ms: u64) -> Self {
        self.bottleneck_threshold_ms = ms;
        self
    }

    /// Set the frame-rate sample window size.
    pub fn with_frame_window(mut self, samples: usize) -> Self {
        self.frame_window = samples;
        self
    }
}
