//! Priority eviction for the bounded entry store.
//!
//! Victims are ordered by `(tier rank asc, access_count asc, idle_time desc)`.
//! Tier dominates recency, so this is not LRU: a long-idle `Hot` entry
//! outlives a freshly touched `Cold` one. The sort is stable over insertion
//! order, so full ties evict the oldest inserted key first.

use indexmap::IndexMap;
use std::cmp::Reverse;
use tokio::time::Instant;

use super::entry::CacheEntry;

/// Selects the keys to evict so that at most `max_entries` remain.
///
/// Returns an empty list when the store is within bounds.
#[must_use]
pub fn select_victims<V>(
    entries: &IndexMap<String, CacheEntry<V>>,
    max_entries: usize,
    now: Instant,
) -> Vec<String> {
    let excess = entries.len().saturating_sub(max_entries);
    if excess == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<&CacheEntry<V>> = entries.values().collect();
    ranked.sort_by_key(|entry| {
        (
            entry.tier.rank(),
            entry.access_count,
            Reverse(entry.idle_time(now)),
        )
    });

    ranked
        .into_iter()
        .take(excess)
        .map(|entry| entry.key.clone())
        .collect()
}
