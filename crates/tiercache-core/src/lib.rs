//! # `TierCache` Core
//!
//! Multi-tier in-process cache manager for template and computed-value
//! caching.
//!
//! ## Features
//!
//! - **Tiered entries**: `Hot` / `Warm` / `Cold` / `Frozen`, promoted on reads
//!   and demoted when idle
//! - **Dependency invalidation**: drop every entry built from a changed source
//! - **Tag invalidation**: drop unrelated entries sharing a label
//! - **TTL expiry**: on access and in periodic maintenance
//! - **Bounded size**: priority eviction once `max_memory_entries` is exceeded
//! - **Warming**: background loading through a caller-supplied loader
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiercache_core::{loader_fn, CacheManager, SetOptions, TierCacheConfig};
//!
//! let config = TierCacheConfig::load()?;
//! let cache = Arc::new(CacheManager::<String>::try_new(config)?);
//! cache.initialize()?;
//!
//! cache.set_with(
//!     "profile:42",
//!     render_profile(42),
//!     SetOptions::new()
//!         .ttl(Duration::from_secs(300))
//!         .depends_on("user:42")
//!         .tag("profiles"),
//! );
//!
//! // A user record changed: drop everything rendered from it
//! cache.invalidate_by_dependency("user:42");
//!
//! // Pre-load likely keys in the background
//! let loader = loader_fn(|key: String| async move { Ok(render_by_key(&key)) });
//! cache.warm_cache(["profile:1", "profile:2"], loader).await?;
//!
//! println!("{:?}", cache.get_stats());
//! cache.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // Acceptable for ratio computations
// =============================================================================
// STYLISTIC LINTS - Safe to allow globally (no bug risk)
// =============================================================================
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::significant_drop_in_scrutinee)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{
    loader_fn, CacheEntry, CacheLoader, CacheManager, CacheStats, CacheTier, EntryInfo,
    EstimateSize, MaintenanceReport, MetricsSnapshot, PerformanceReport, SetOptions,
    TierBreakdown, TieringPolicy, DEFAULT_SIZE_ESTIMATE,
};
pub use config::{ConfigError, TierCacheConfig};
pub use error::{Error, Result};
