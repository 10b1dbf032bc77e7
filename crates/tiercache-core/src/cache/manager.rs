//! The cache manager facade.
//!
//! Every public operation takes the state lock once and never awaits while
//! holding it, so operations are atomic with respect to each other. The
//! maintenance loop and warming consumer go through the same methods.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::entry::{CacheEntry, EntryInfo};
use super::eviction::select_victims;
use super::index::KeyIndex;
use super::maintenance;
use super::metrics::{
    CacheMetrics, CacheStats, MetricsSnapshot, OperationKind, PerformanceReport,
    PerformanceWindow, TierBreakdown,
};
use super::size::{estimate_or_default, EstimateSize};
use super::tier::{CacheTier, TieringPolicy};
use super::warming::{self, WarmRequest};
use crate::config::TierCacheConfig;
use crate::error::{Error, Result};

/// Options for [`CacheManager::set_with`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    ttl: Option<Duration>,
    dependencies: Vec<String>,
    tags: Vec<String>,
    tier: CacheTier,
}

impl SetOptions {
    /// Default options: no TTL, no labels, `Cold` tier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the entry `ttl` after it is set.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Invalidate the entry when `dependency` is invalidated.
    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Adds several dependencies at once.
    #[must_use]
    pub fn dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Labels the entry with `tag`.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds several tags at once.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Places the entry in `tier` instead of `Cold`.
    #[must_use]
    pub fn tier(mut self, tier: CacheTier) -> Self {
        self.tier = tier;
        self
    }
}

/// Entry map plus both indexes, guarded as one unit.
#[derive(Debug)]
pub(crate) struct CacheState<V> {
    pub(crate) entries: IndexMap<String, CacheEntry<V>>,
    pub(crate) dependencies: KeyIndex,
    pub(crate) tags: KeyIndex,
    pub(crate) memory_usage: usize,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            dependencies: KeyIndex::new(),
            tags: KeyIndex::new(),
            memory_usage: 0,
        }
    }
}

impl<V> CacheState<V> {
    /// Inserts `entry`, replacing and detaching any previous entry for its key.
    fn attach(&mut self, entry: CacheEntry<V>) {
        if let Some(previous) = self.entries.get(&entry.key) {
            self.dependencies
                .remove_all(&previous.key, &previous.dependencies);
            self.tags.remove_all(&previous.key, &previous.tags);
            self.memory_usage = self.memory_usage.saturating_sub(previous.size);
        }

        self.dependencies.insert_all(&entry.key, &entry.dependencies);
        self.tags.insert_all(&entry.key, &entry.tags);
        self.memory_usage = self.memory_usage.saturating_add(entry.size);
        // An existing key keeps its slot in insertion order.
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Removes an entry and its index memberships.
    fn detach(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.shift_remove(key)?;
        self.dependencies.remove_all(key, &entry.dependencies);
        self.tags.remove_all(key, &entry.tags);
        self.memory_usage = self.memory_usage.saturating_sub(entry.size);
        Some(entry)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.dependencies.clear();
        self.tags.clear();
        self.memory_usage = 0;
    }
}

/// Handles for the spawned background tasks.
struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

/// Multi-tier in-process cache.
///
/// Construct one per application and share it behind an `Arc`. Call
/// [`initialize`](Self::initialize) to start the maintenance loop and warming
/// consumer, and [`shutdown`](Self::shutdown) to stop them.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use tiercache_core::{CacheManager, SetOptions, TierCacheConfig};
///
/// let cache = Arc::new(CacheManager::<String>::new(TierCacheConfig::default()));
/// cache.initialize()?;
///
/// cache.set_with(
///     "page:home",
///     "<html>...</html>".to_string(),
///     SetOptions::new().depends_on("template:home").tag("pages"),
/// );
/// assert!(cache.get("page:home").is_some());
///
/// cache.invalidate_by_dependency("template:home");
/// cache.shutdown().await;
/// ```
pub struct CacheManager<V> {
    config: TierCacheConfig,
    policy: TieringPolicy,
    pub(crate) state: RwLock<CacheState<V>>,
    pub(crate) metrics: CacheMetrics,
    perf: PerformanceWindow,
    tasks: Mutex<Option<BackgroundTasks>>,
    pub(crate) warm_tx: RwLock<Option<mpsc::Sender<WarmRequest<V>>>>,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + EstimateSize + 'static,
{
    /// Creates a manager. The configuration is used as given; see
    /// [`try_new`](Self::try_new) for a validating constructor.
    #[must_use]
    pub fn new(config: TierCacheConfig) -> Self {
        let policy = TieringPolicy::new(config.cache.promotion_threshold, config.demotion_idle());
        let perf = PerformanceWindow::new(config.stats.performance_window);
        Self {
            config,
            policy,
            state: RwLock::new(CacheState::default()),
            metrics: CacheMetrics::default(),
            perf,
            tasks: Mutex::new(None),
            warm_tx: RwLock::new(None),
        }
    }

    /// Validates `config` and creates a manager.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if validation fails.
    pub fn try_new(config: TierCacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Configuration this manager was built with.
    #[must_use]
    pub fn config(&self) -> &TierCacheConfig {
        &self.config
    }

    /// Tiering thresholds in effect.
    #[must_use]
    pub fn policy(&self) -> TieringPolicy {
        self.policy
    }

    // ------------------------------------------------------------------
    // Entry store
    // ------------------------------------------------------------------

    /// Returns a clone of the cached value, or `None` on a miss.
    ///
    /// A hit touches the entry and may promote it one tier. An expired entry
    /// is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let started = std::time::Instant::now();
        let now = Instant::now();

        let value = {
            let mut state = self.state.write();
            let lookup = match state.entries.get_mut(key) {
                None => Lookup::Miss,
                Some(entry) if entry.is_expired(now) => Lookup::Expired,
                Some(entry) => {
                    entry.touch(now);
                    if let Some(target) = self.policy.promotion_target(entry) {
                        tracing::trace!(key, from = %entry.tier, to = %target, "Promoted entry");
                        entry.tier = target;
                        CacheMetrics::incr(&self.metrics.tier_promotions);
                    }
                    Lookup::Hit(entry.value.clone())
                }
            };

            match lookup {
                Lookup::Hit(value) => Some(value),
                Lookup::Expired => {
                    self.remove_locked(&mut state, key);
                    CacheMetrics::incr(&self.metrics.expirations);
                    None
                }
                Lookup::Miss => None,
            }
        };

        let kind = if value.is_some() {
            CacheMetrics::incr(&self.metrics.hits);
            OperationKind::GetHit
        } else {
            CacheMetrics::incr(&self.metrics.misses);
            OperationKind::GetMiss
        };
        self.perf.record(kind, started.elapsed());

        value
    }

    /// Like [`get`](Self::get), returning `default` on a miss.
    pub fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Stores `value` under `key` with default options.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with(key, value, SetOptions::default());
    }

    /// Stores `value` under `key`.
    ///
    /// Any existing entry is replaced by a fresh one: creation time and access
    /// count start over. If the store then holds more than
    /// `max_memory_entries`, the lowest-priority entries are evicted.
    pub fn set_with(&self, key: impl Into<String>, value: V, options: SetOptions) {
        let started = std::time::Instant::now();
        let entry = self.build_entry(key.into(), value, options);

        {
            let mut state = self.state.write();
            self.attach_locked(&mut state, entry);
        }

        self.perf.record(OperationKind::Set, started.elapsed());
    }

    /// Stores `value` only if no live entry exists for `key`.
    ///
    /// The presence check and the insert happen under one write lock, so a
    /// concurrent [`set_with`](Self::set_with) is never overwritten. An expired
    /// entry counts as absent. Returns whether the value was stored.
    pub(crate) fn insert_if_absent(&self, key: String, value: V, options: SetOptions) -> bool {
        let started = std::time::Instant::now();
        let entry = self.build_entry(key, value, options);

        let inserted = {
            let mut state = self.state.write();
            let now = Instant::now();
            let live = state
                .entries
                .get(&entry.key)
                .is_some_and(|existing| !existing.is_expired(now));
            if !live {
                self.attach_locked(&mut state, entry);
            }
            !live
        };

        if inserted {
            self.perf.record(OperationKind::Set, started.elapsed());
        }
        inserted
    }

    fn build_entry(&self, key: String, value: V, options: SetOptions) -> CacheEntry<V> {
        let size = estimate_or_default(&key, &value);
        let mut entry = CacheEntry::new(key, value, size, options.tier);
        entry.ttl = options.ttl.or_else(|| self.config.default_ttl());
        entry.dependencies = options.dependencies.into_iter().collect();
        entry.tags = options.tags.into_iter().collect();
        entry
    }

    fn attach_locked(&self, state: &mut CacheState<V>, entry: CacheEntry<V>) {
        state.attach(entry);
        if state.entries.len() > self.config.cache.max_memory_entries {
            self.evict_locked(state, Instant::now());
        }
    }

    /// Removes `key`. Returns whether an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.write();
        self.remove_locked(&mut state, key)
    }

    /// Whether a live (unexpired) entry exists. Does not touch the entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.state
            .read()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Number of stored entries, including expired ones not yet collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Metadata for `key` without touching it.
    #[must_use]
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let now = Instant::now();
        self.state.read().entries.get(key).map(|entry| entry.info(now))
    }

    /// Keys currently tied to `dependency`, sorted.
    #[must_use]
    pub fn dependency_keys(&self, dependency: &str) -> Vec<String> {
        self.state.read().dependencies.keys(dependency)
    }

    /// Keys currently labelled `tag`, sorted.
    #[must_use]
    pub fn tag_keys(&self, tag: &str) -> Vec<String> {
        self.state.read().tags.keys(tag)
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Removes every entry that declared `dependency` and drops its bucket.
    ///
    /// Returns the removed keys, sorted.
    pub fn invalidate_by_dependency(&self, dependency: &str) -> Vec<String> {
        let removed = {
            let mut state = self.state.write();
            let keys = state.dependencies.keys(dependency);
            let removed: Vec<String> = keys
                .into_iter()
                .filter(|key| self.remove_locked(&mut state, key))
                .collect();
            state.dependencies.remove_bucket(dependency);
            removed
        };

        CacheMetrics::add(&self.metrics.invalidations, removed.len());
        tracing::debug!(
            dependency,
            removed = removed.len(),
            "Invalidated by dependency"
        );
        removed
    }

    /// Removes every entry carrying any of `tags`, each at most once.
    ///
    /// Returns the removed keys, sorted.
    pub fn invalidate_by_tags<I, S>(&self, tags: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write();
        let targets: BTreeSet<String> = tags
            .into_iter()
            .flat_map(|tag| state.tags.keys(tag.as_ref()))
            .collect();
        let removed: Vec<String> = targets
            .into_iter()
            .filter(|key| self.remove_locked(&mut state, key))
            .collect();
        drop(state);

        CacheMetrics::add(&self.metrics.invalidations, removed.len());
        tracing::debug!(removed = removed.len(), "Invalidated by tags");
        removed
    }

    /// Removes entries whose key matches `pattern`, or everything if `None`.
    ///
    /// The pattern is a regular expression matched anywhere in the key.
    /// Clearing does not count as eviction. Returns how many entries were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if `pattern` does not compile.
    pub fn clear(&self, pattern: Option<&str>) -> Result<usize> {
        let matcher = pattern.map(Regex::new).transpose()?;

        let mut state = self.state.write();
        let removed = match matcher {
            None => {
                let count = state.entries.len();
                state.clear();
                count
            }
            Some(re) => {
                let keys: Vec<String> = state
                    .entries
                    .keys()
                    .filter(|key| re.is_match(key))
                    .cloned()
                    .collect();
                let mut removed = 0;
                for key in &keys {
                    if state.detach(key).is_some() {
                        removed += 1;
                    }
                }
                removed
            }
        };
        drop(state);

        tracing::debug!(pattern, removed, "Cleared cache entries");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Entry counts, memory per tier, counters, and key samples.
    #[must_use]
    pub fn get_stats(&self) -> CacheStats {
        let sample_size = self.config.stats.sample_size;
        let state = self.state.read();

        let mut entries_by_tier = TierBreakdown::default();
        let mut memory_by_tier = TierBreakdown::default();
        let mut hot_keys = Vec::new();
        let mut cold_keys = Vec::new();

        for entry in state.entries.values() {
            entries_by_tier.add(entry.tier, 1);
            memory_by_tier.add(entry.tier, entry.size);
            match entry.tier {
                CacheTier::Hot => hot_keys.push(entry.key.clone()),
                CacheTier::Cold => cold_keys.push(entry.key.clone()),
                CacheTier::Warm | CacheTier::Frozen => {}
            }
        }

        hot_keys.sort_unstable();
        hot_keys.truncate(sample_size);
        cold_keys.sort_unstable();
        cold_keys.truncate(sample_size);

        CacheStats {
            total_entries: state.entries.len(),
            entries_by_tier,
            memory_by_tier,
            memory_usage: state.memory_usage,
            dependency_count: state.dependencies.len(),
            tag_count: state.tags.len(),
            metrics: self.metrics.snapshot(state.memory_usage),
            hot_keys_sample: hot_keys,
            cold_keys_sample: cold_keys,
        }
    }

    /// Stats plus hit ratio and mean `get` latency over recent operations.
    #[must_use]
    pub fn get_performance_report(&self) -> PerformanceReport {
        let stats = self.get_stats();
        let window = self.perf.summarize();
        let lifetime_hit_rate = stats.metrics.hit_rate();

        PerformanceReport {
            stats,
            window_samples: window.samples,
            window_get_samples: window.get_samples,
            recent_hit_ratio: window.hit_ratio,
            avg_get_latency: window.avg_get_latency,
            lifetime_hit_rate,
        }
    }

    /// Current counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        let memory_usage = self.state.read().memory_usage;
        self.metrics.snapshot(memory_usage)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Spawns the maintenance loop and warming consumer on the current Tokio
    /// runtime. Calling it again while running does nothing.
    ///
    /// The tasks hold a reference to the manager until
    /// [`shutdown`](Self::shutdown) is called.
    ///
    /// # Errors
    ///
    /// Returns `Error::Runtime` when called outside a Tokio runtime.
    pub fn initialize(self: &Arc<Self>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let mut tasks = self.tasks.lock();
        if tasks.is_some() {
            tracing::debug!("Cache manager already initialized");
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(2);

        if self.config.maintenance.enabled {
            let loop_future = maintenance::run_loop(
                Arc::clone(self),
                self.config.maintenance_interval(),
                shutdown_rx.clone(),
            );
            handles.push(("maintenance", runtime.spawn(loop_future)));
        }

        if self.config.warming.enabled {
            let (warm_tx, warm_rx) = mpsc::channel(self.config.warming.queue_capacity.max(1));
            *self.warm_tx.write() = Some(warm_tx);
            let consumer = warming::run_consumer(Arc::clone(self), warm_rx, shutdown_rx);
            handles.push(("warming", runtime.spawn(consumer)));
        }

        tracing::debug!(
            maintenance = self.config.maintenance.enabled,
            warming = self.config.warming.enabled,
            interval_secs = self.config.maintenance.interval_secs,
            "Cache manager initialized"
        );

        *tasks = Some(BackgroundTasks {
            shutdown: shutdown_tx,
            handles,
        });
        Ok(())
    }

    /// Whether background tasks are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some()
    }

    /// Stops the background tasks and clears every entry and index.
    ///
    /// Counters are kept. The manager can be initialized again afterwards.
    pub async fn shutdown(&self) {
        let tasks = self.tasks.lock().take();
        self.warm_tx.write().take();

        if let Some(tasks) = tasks {
            // Receivers may already be gone if a task exited on its own.
            let _ = tasks.shutdown.send(true);
            for (name, handle) in tasks.handles {
                match handle.await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {
                        tracing::debug!(task = name, "Background task cancelled");
                    }
                    Err(e) => {
                        tracing::warn!(task = name, error = %e, "Background task ended abnormally");
                    }
                }
            }
        }

        self.state.write().clear();
        self.perf.clear();
        tracing::debug!("Cache manager shut down");
    }

    // ------------------------------------------------------------------
    // Internals shared with maintenance and warming
    // ------------------------------------------------------------------

    /// Delete path: detaches the entry and counts an eviction.
    pub(crate) fn remove_locked(&self, state: &mut CacheState<V>, key: &str) -> bool {
        if state.detach(key).is_some() {
            CacheMetrics::incr(&self.metrics.evictions);
            true
        } else {
            false
        }
    }

    /// Evicts the lowest-priority entries until the bound holds.
    pub(crate) fn evict_locked(&self, state: &mut CacheState<V>, now: Instant) -> usize {
        let victims = select_victims(&state.entries, self.config.cache.max_memory_entries, now);
        let mut evicted = 0;
        for key in &victims {
            if self.remove_locked(state, key) {
                tracing::trace!(key = key.as_str(), "Evicted entry");
                evicted += 1;
            }
        }
        evicted
    }

    /// Demotes idle entries and promotes busy ones, one step each.
    ///
    /// An entry idle past the demotion threshold is never promoted, so an
    /// untouched entry settles in `Cold` instead of bouncing between tiers.
    ///
    /// Returns `(demoted, promoted)`.
    pub(crate) fn optimize_tiers_locked(
        &self,
        state: &mut CacheState<V>,
        now: Instant,
    ) -> (usize, usize) {
        let mut demoted = 0;
        let mut promoted = 0;

        for entry in state.entries.values_mut() {
            if let Some(target) = self.policy.demotion_target(entry, now) {
                tracing::trace!(key = entry.key.as_str(), from = %entry.tier, to = %target, "Demoted entry");
                entry.tier = target;
                demoted += 1;
            } else if let Some(target) = self
                .policy
                .promotion_target(entry)
                .filter(|_| !self.policy.is_idle(entry, now))
            {
                tracing::trace!(key = entry.key.as_str(), from = %entry.tier, to = %target, "Promoted entry");
                entry.tier = target;
                promoted += 1;
            }
        }

        CacheMetrics::add(&self.metrics.tier_demotions, demoted);
        CacheMetrics::add(&self.metrics.tier_promotions, promoted);
        (demoted, promoted)
    }
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Miss,
}
