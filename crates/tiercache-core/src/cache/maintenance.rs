//! Periodic maintenance: TTL sweep, tier optimization, eviction.

use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::manager::CacheManager;
use super::metrics::CacheMetrics;
use super::size::EstimateSize;

/// What one maintenance pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Expired entries removed.
    pub expired: usize,
    /// Entries moved one tier down.
    pub demoted: usize,
    /// Entries moved one tier up.
    pub promoted: usize,
    /// Entries evicted to restore the entry bound.
    pub evicted: usize,
}

impl MaintenanceReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + EstimateSize + 'static,
{
    /// Runs one maintenance pass immediately.
    ///
    /// In order: removes expired entries, demotes idle entries and promotes
    /// busy ones, then evicts down to `max_memory_entries`. The background
    /// loop calls this on every tick.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let now = Instant::now();
        let mut state = self.state.write();

        let expired_keys: Vec<String> = state
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();
        let expired = expired_keys
            .iter()
            .filter(|key| self.remove_locked(&mut state, key))
            .count();
        CacheMetrics::add(&self.metrics.expirations, expired);

        let (demoted, promoted) = self.optimize_tiers_locked(&mut state, now);
        let evicted = self.evict_locked(&mut state, now);

        MaintenanceReport {
            expired,
            demoted,
            promoted,
            evicted,
        }
    }
}

/// Background loop driving [`CacheManager::run_maintenance`].
///
/// The first pass runs one full `period` after start. A panicking pass is
/// logged and the loop carries on at the next tick.
pub(crate) async fn run_loop<V>(
    manager: Arc<CacheManager<V>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    V: Clone + Send + Sync + EstimateSize + 'static,
{
    // `interval_at` rejects a zero period.
    let period = period.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(
        interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        "Maintenance loop started"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match catch_unwind(AssertUnwindSafe(|| manager.run_maintenance())) {
                    Ok(report) if report.is_empty() => {}
                    Ok(report) => {
                        tracing::debug!(
                            expired = report.expired,
                            demoted = report.demoted,
                            promoted = report.promoted,
                            evicted = report.evicted,
                            "Maintenance pass completed"
                        );
                    }
                    Err(_) => {
                        tracing::error!("Maintenance pass panicked, retrying at next interval");
                    }
                }
            }
        }
    }

    tracing::debug!("Maintenance loop stopped");
}
