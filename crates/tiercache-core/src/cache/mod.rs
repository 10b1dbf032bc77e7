//! Multi-tier cache: entry store, tiering, invalidation indexes, eviction,
//! maintenance and warming.
//!
//! - Entries live in `Hot`, `Warm`, `Cold` (default) or `Frozen` tiers
//! - Reads promote busy entries, maintenance demotes idle ones
//! - Dependency and tag indexes drive bulk invalidation
//! - Eviction keeps at most `max_memory_entries`, lowest tier first
//!
//! # Thread-Safety & Lock Ordering
//!
//! The entry map, both indexes and the memory gauge share one
//! `parking_lot::RwLock`, so every public operation is atomic. Counters are
//! atomics outside the lock.
//!
//! **Lock Hierarchy (acquire in this order to prevent deadlocks):**
//! 1. `CacheManager.state` (RwLock)
//! 2. `PerformanceWindow.samples` (Mutex)
//!
//! `CacheManager.tasks` and `CacheManager.warm_tx` are only taken during
//! lifecycle calls and `warm_cache`, never while `state` is held.

mod entry;
mod eviction;
mod index;
mod maintenance;
mod manager;
mod metrics;
mod size;
mod tier;
mod warming;

pub use entry::{CacheEntry, EntryInfo};
pub use eviction::select_victims;
pub use index::KeyIndex;
pub use maintenance::MaintenanceReport;
pub use manager::{CacheManager, SetOptions};
pub use metrics::{
    CacheMetrics, CacheStats, MetricsSnapshot, OperationKind, PerformanceReport, TierBreakdown,
};
pub use size::{EstimateSize, DEFAULT_SIZE_ESTIMATE};
pub use tier::{CacheTier, TieringPolicy};
pub use warming::{loader_fn, CacheLoader, FnLoader};
