//! Taskdeck - data and runtime engine for a terminal task manager
//!
//! Provides the non-rendering half of the application: event pub/sub,
//! TTL caching under a memory budget, a filterable virtual data source,
//! the filter/sort/query engine, viewport scrolling state, and the
//! background task runtime.

pub mod background;
pub mod bus;
pub mod cache;
pub mod config;
pub mod data_source;
pub mod error;
pub mod events;
pub mod filter;
pub mod models;
pub mod traits;
pub mod viewport;

pub use background::{BackgroundProcessor, MemoryPool, PerformanceMonitor, ResourceManager, TaskPriority};
pub use bus::{EventBus, Subscription};
pub use cache::CacheManager;
pub use config::EngineConfig;
pub use data_source::VirtualDataSource;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventKind};
pub use filter::{FilterEngine, GroupLogic, TaskFilter};
pub use models::{Priority, Task, TaskStatus};
pub use viewport::VirtualScrollingViewport;
