//! Cache counters, stats snapshots, and the rolling performance window.

#![allow(clippy::cast_precision_loss)] // Precision loss acceptable for ratios

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::tier::CacheTier;

/// Monotonic counters, updated lock-free.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) evictions: AtomicU64,
    pub(crate) warming_operations: AtomicU64,
    pub(crate) warming_failures: AtomicU64,
    pub(crate) invalidations: AtomicU64,
    pub(crate) tier_promotions: AtomicU64,
    pub(crate) tier_demotions: AtomicU64,
    pub(crate) expirations: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        if n > 0 {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of every counter plus the memory gauge.
    #[must_use]
    pub fn snapshot(&self, memory_usage: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            warming_operations: self.warming_operations.load(Ordering::Relaxed),
            warming_failures: self.warming_failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            tier_promotions: self.tier_promotions.load(Ordering::Relaxed),
            tier_demotions: self.tier_demotions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            memory_usage,
        }
    }
}

/// Copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Successful lookups.
    pub hits: u64,
    /// Lookups that found nothing or an expired entry.
    pub misses: u64,
    /// Entries removed through the delete path.
    pub evictions: u64,
    /// Keys submitted for warming.
    pub warming_operations: u64,
    /// Warming requests whose loader failed.
    pub warming_failures: u64,
    /// Entries removed by dependency or tag invalidation.
    pub invalidations: u64,
    /// One-step tier promotions.
    pub tier_promotions: u64,
    /// One-step tier demotions.
    pub tier_demotions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Sum of live entry sizes in bytes.
    pub memory_usage: usize,
}

impl MetricsSnapshot {
    /// Lifetime hit rate (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A count or byte total per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierBreakdown {
    /// Hot tier.
    pub hot: usize,
    /// Warm tier.
    pub warm: usize,
    /// Cold tier.
    pub cold: usize,
    /// Frozen tier.
    pub frozen: usize,
}

impl TierBreakdown {
    /// Adds `amount` to the given tier's slot.
    pub fn add(&mut self, tier: CacheTier, amount: usize) {
        match tier {
            CacheTier::Hot => self.hot += amount,
            CacheTier::Warm => self.warm += amount,
            CacheTier::Cold => self.cold += amount,
            CacheTier::Frozen => self.frozen += amount,
        }
    }

    /// Value for one tier.
    #[must_use]
    pub fn get(&self, tier: CacheTier) -> usize {
        match tier {
            CacheTier::Hot => self.hot,
            CacheTier::Warm => self.warm,
            CacheTier::Cold => self.cold,
            CacheTier::Frozen => self.frozen,
        }
    }

    /// Sum across tiers.
    #[must_use]
    pub fn total(&self) -> usize {
        self.hot + self.warm + self.cold + self.frozen
    }
}

/// Output of `CacheManager::get_stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Live entries.
    pub total_entries: usize,
    /// Live entries per tier.
    pub entries_by_tier: TierBreakdown,
    /// Estimated bytes per tier.
    pub memory_by_tier: TierBreakdown,
    /// Sum of live entry sizes.
    pub memory_usage: usize,
    /// Number of dependency buckets.
    pub dependency_count: usize,
    /// Number of tag buckets.
    pub tag_count: usize,
    /// Running counters.
    pub metrics: MetricsSnapshot,
    /// Up to `sample_size` hot keys, sorted.
    pub hot_keys_sample: Vec<String>,
    /// Up to `sample_size` cold keys, sorted.
    pub cold_keys_sample: Vec<String>,
}

/// Kind of recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// A `get` that returned a value.
    GetHit,
    /// A `get` that returned nothing.
    GetMiss,
    /// A `set`.
    Set,
}

#[derive(Debug, Clone, Copy)]
struct OperationSample {
    kind: OperationKind,
    latency: Duration,
}

/// Bounded ring of the most recent operations.
#[derive(Debug)]
pub(crate) struct PerformanceWindow {
    capacity: usize,
    samples: Mutex<VecDeque<OperationSample>>,
}

impl PerformanceWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(crate) fn record(&self, kind: OperationKind, latency: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(OperationSample { kind, latency });
    }

    /// Hit ratio and mean `get` latency over the window.
    pub(crate) fn summarize(&self) -> WindowSummary {
        let samples = self.samples.lock();
        let mut gets = 0usize;
        let mut hits = 0usize;
        let mut get_latency = Duration::ZERO;

        for sample in samples.iter() {
            match sample.kind {
                OperationKind::GetHit => {
                    gets += 1;
                    hits += 1;
                    get_latency += sample.latency;
                }
                OperationKind::GetMiss => {
                    gets += 1;
                    get_latency += sample.latency;
                }
                OperationKind::Set => {}
            }
        }

        let (hit_ratio, avg_get_latency) = if gets == 0 {
            (0.0, Duration::ZERO)
        } else {
            (
                hits as f64 / gets as f64,
                get_latency / u32::try_from(gets).unwrap_or(u32::MAX),
            )
        };

        WindowSummary {
            samples: samples.len(),
            get_samples: gets,
            hit_ratio,
            avg_get_latency,
        }
    }

    pub(crate) fn clear(&self) {
        self.samples.lock().clear();
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WindowSummary {
    pub(crate) samples: usize,
    pub(crate) get_samples: usize,
    pub(crate) hit_ratio: f64,
    pub(crate) avg_get_latency: Duration,
}

/// Output of `CacheManager::get_performance_report`.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    /// Full stats snapshot.
    pub stats: CacheStats,
    /// Operations in the rolling window.
    pub window_samples: usize,
    /// `get` operations in the rolling window.
    pub window_get_samples: usize,
    /// Hit ratio over the window's `get` operations.
    pub recent_hit_ratio: f64,
    /// Mean `get` latency over the window.
    pub avg_get_latency: Duration,
    /// Hit rate since creation.
    pub lifetime_hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_hit_rate() {
        let snapshot = MetricsSnapshot {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((snapshot.hit_rate() - 0.8).abs() < 0.001);
        assert!((MetricsSnapshot::default().hit_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counters_snapshot() {
        let metrics = CacheMetrics::default();
        CacheMetrics::incr(&metrics.hits);
        CacheMetrics::incr(&metrics.hits);
        CacheMetrics::add(&metrics.invalidations, 3);
        CacheMetrics::add(&metrics.evictions, 0);

        let snapshot = metrics.snapshot(128);

        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.invalidations, 3);
        assert_eq!(snapshot.evictions, 0);
        assert_eq!(snapshot.memory_usage, 128);
    }

    #[test]
    fn test_tier_breakdown() {
        let mut breakdown = TierBreakdown::default();
        breakdown.add(CacheTier::Hot, 2);
        breakdown.add(CacheTier::Cold, 5);
        breakdown.add(CacheTier::Hot, 1);

        assert_eq!(breakdown.get(CacheTier::Hot), 3);
        assert_eq!(breakdown.get(CacheTier::Warm), 0);
        assert_eq!(breakdown.total(), 8);
    }

    #[test]
    fn test_window_is_bounded() {
        let window = PerformanceWindow::new(3);
        for _ in 0..10 {
            window.record(OperationKind::Set, Duration::from_micros(1));
        }

        let summary = window.summarize();
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.get_samples, 0);
        assert_eq!(summary.avg_get_latency, Duration::ZERO);
    }

    #[test]
    fn test_window_hit_ratio_and_latency() {
        let window = PerformanceWindow::new(100);
        window.record(OperationKind::GetHit, Duration::from_micros(10));
        window.record(OperationKind::GetHit, Duration::from_micros(30));
        window.record(OperationKind::GetMiss, Duration::from_micros(20));
        window.record(OperationKind::GetMiss, Duration::from_micros(20));
        window.record(OperationKind::Set, Duration::from_millis(5));

        let summary = window.summarize();

        assert_eq!(summary.samples, 5);
        assert_eq!(summary.get_samples, 4);
        assert!((summary.hit_ratio - 0.5).abs() < 0.001);
        assert_eq!(summary.avg_get_latency, Duration::from_micros(20));
    }

    #[test]
    fn test_window_drops_oldest() {
        let window = PerformanceWindow::new(2);
        window.record(OperationKind::GetMiss, Duration::from_micros(1));
        window.record(OperationKind::GetHit, Duration::from_micros(1));
        window.record(OperationKind::GetHit, Duration::from_micros(1));

        let summary = window.summarize();
        assert!((summary.hit_ratio - 1.0).abs() < 0.001);
    }
}
