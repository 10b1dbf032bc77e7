//! Cache entry and its read-only snapshot.

use rustc_hash::FxHashSet;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::tier::CacheTier;

/// A cached value with its placement and bookkeeping metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Unique key, stable for the lifetime of the entry.
    pub key: String,
    /// Cached payload.
    pub value: V,
    /// Current tier.
    pub tier: CacheTier,
    /// When the entry was (re)created by `set`.
    pub created_at: Instant,
    /// Last successful `get`, or `created_at`.
    pub last_accessed: Instant,
    /// Successful `get` calls since creation.
    pub access_count: u64,
    /// External identifiers whose invalidation removes this entry.
    pub dependencies: FxHashSet<String>,
    /// Group labels for bulk invalidation.
    pub tags: FxHashSet<String>,
    /// Estimated footprint in bytes.
    pub size: usize,
    /// Time-to-live measured from `created_at`.
    pub ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    /// Creates a fresh entry with no TTL, dependencies, or tags.
    #[must_use]
    pub fn new(key: String, value: V, size: usize, tier: CacheTier) -> Self {
        let now = Instant::now();
        Self {
            key,
            value,
            tier,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            dependencies: FxHashSet::default(),
            tags: FxHashSet::default(),
            size,
            ttl: None,
        }
    }

    /// Time since creation.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Time since last access.
    #[must_use]
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed)
    }

    /// An entry expires once its age strictly exceeds its TTL.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.ttl.is_some_and(|ttl| self.age(now) > ttl)
    }

    /// Records a successful read.
    pub fn touch(&mut self, now: Instant) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
    }

    /// Metadata snapshot that does not expose the value.
    #[must_use]
    pub fn info(&self, now: Instant) -> EntryInfo {
        let mut dependencies: Vec<String> = self.dependencies.iter().cloned().collect();
        dependencies.sort_unstable();
        let mut tags: Vec<String> = self.tags.iter().cloned().collect();
        tags.sort_unstable();

        EntryInfo {
            key: self.key.clone(),
            tier: self.tier,
            access_count: self.access_count,
            size: self.size,
            ttl: self.ttl,
            age: self.age(now),
            idle_time: self.idle_time(now),
            dependencies,
            tags,
        }
    }
}

/// Read-only view of an entry's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    /// Entry key.
    pub key: String,
    /// Current tier.
    pub tier: CacheTier,
    /// Successful reads since creation.
    pub access_count: u64,
    /// Estimated size in bytes.
    pub size: usize,
    /// Configured TTL.
    pub ttl: Option<Duration>,
    /// Time since creation.
    pub age: Duration,
    /// Time since last access.
    pub idle_time: Duration,
    /// Sorted dependencies.
    pub dependencies: Vec<String>,
    /// Sorted tags.
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_new_entry_defaults() {
        let entry = CacheEntry::new("a".to_string(), 1u32, 4, CacheTier::Cold);

        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.created_at, entry.last_accessed);
        assert!(entry.ttl.is_none());
        assert!(!entry.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_strictly_after_ttl() {
        let mut entry = CacheEntry::new("a".to_string(), 1u32, 4, CacheTier::Cold);
        entry.ttl = Some(Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!entry.is_expired(Instant::now()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_resets_idle_time() {
        let mut entry = CacheEntry::new("a".to_string(), 1u32, 4, CacheTier::Cold);
        tokio::time::advance(Duration::from_secs(30)).await;

        let now = Instant::now();
        assert_eq!(entry.idle_time(now), Duration::from_secs(30));

        entry.touch(now);
        assert_eq!(entry.access_count, 1);
        assert_eq!(entry.idle_time(now), Duration::ZERO);
        assert_eq!(entry.age(now), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_sorts_labels() {
        let mut entry = CacheEntry::new("a".to_string(), 1u32, 4, CacheTier::Warm);
        entry.tags.insert("zeta".to_string());
        entry.tags.insert("alpha".to_string());
        entry.dependencies.insert("user:2".to_string());
        entry.dependencies.insert("user:1".to_string());

        let info = entry.info(Instant::now());

        assert_eq!(info.tags, vec!["alpha", "zeta"]);
        assert_eq!(info.dependencies, vec!["user:1", "user:2"]);
        assert_eq!(info.tier, CacheTier::Warm);
    }
}
