//! Cache tiers and the promote/demote policy.
//!
//! The policy is pure: it looks at an entry and a point in time and answers
//! whether the entry should move. The manager applies the move and counts it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use super::entry::CacheEntry;

/// Coarse priority class of an entry.
///
/// Value order is `Cold < Warm < Hot`. `Frozen` is an archival tier that ranks
/// below `Cold` and is never assigned or changed by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Archival tier, only reachable through an explicit `set`.
    Frozen,
    /// Default tier for freshly set entries.
    #[default]
    Cold,
    /// Promoted once, or warmed proactively.
    Warm,
    /// Most frequently accessed entries.
    Hot,
}

impl CacheTier {
    /// All tiers from lowest to highest rank.
    pub const ALL: [CacheTier; 4] = [Self::Frozen, Self::Cold, Self::Warm, Self::Hot];

    /// Numeric rank used for eviction ordering (lower is evicted first).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Frozen => 0,
            Self::Cold => 1,
            Self::Warm => 2,
            Self::Hot => 3,
        }
    }

    /// The tier one step closer to `Hot`, or `None` if no promotion applies.
    #[must_use]
    pub const fn promoted(self) -> Option<Self> {
        match self {
            Self::Cold => Some(Self::Warm),
            Self::Warm => Some(Self::Hot),
            Self::Hot | Self::Frozen => None,
        }
    }

    /// The tier one step closer to `Cold`, or `None` if no demotion applies.
    #[must_use]
    pub const fn demoted(self) -> Option<Self> {
        match self {
            Self::Hot => Some(Self::Warm),
            Self::Warm => Some(Self::Cold),
            Self::Cold | Self::Frozen => None,
        }
    }

    /// Lowercase name, as used in stats output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frozen => "frozen",
            Self::Cold => "cold",
            Self::Warm => "warm",
            Self::Hot => "hot",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Promotion and demotion thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieringPolicy {
    /// Access count at which an entry moves up one tier.
    pub promotion_threshold: u64,
    /// Idle time beyond which an entry moves down one tier.
    pub demotion_idle: Duration,
}

impl Default for TieringPolicy {
    fn default() -> Self {
        Self {
            promotion_threshold: 5,
            demotion_idle: Duration::from_secs(3600),
        }
    }
}

impl TieringPolicy {
    /// Creates a policy with explicit thresholds.
    #[must_use]
    pub fn new(promotion_threshold: u64, demotion_idle: Duration) -> Self {
        Self {
            promotion_threshold,
            demotion_idle,
        }
    }

    /// Returns the tier the entry should be promoted to, if any.
    #[must_use]
    pub fn promotion_target<V>(&self, entry: &CacheEntry<V>) -> Option<CacheTier> {
        if entry.access_count >= self.promotion_threshold {
            entry.tier.promoted()
        } else {
            None
        }
    }

    /// Whether the entry has gone unread for longer than `demotion_idle`.
    #[must_use]
    pub fn is_idle<V>(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        entry.idle_time(now) > self.demotion_idle
    }

    /// Returns the tier the entry should be demoted to at `now`, if any.
    #[must_use]
    pub fn demotion_target<V>(&self, entry: &CacheEntry<V>, now: Instant) -> Option<CacheTier> {
        if self.is_idle(entry, now) {
            entry.tier.demoted()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheEntry;

    fn entry_in(tier: CacheTier, access_count: u64) -> CacheEntry<String> {
        let mut entry = CacheEntry::new("k".to_string(), "v".to_string(), 1, tier);
        entry.access_count = access_count;
        entry
    }

    #[test]
    fn test_tier_rank_order() {
        assert!(CacheTier::Frozen.rank() < CacheTier::Cold.rank());
        assert!(CacheTier::Cold.rank() < CacheTier::Warm.rank());
        assert!(CacheTier::Warm.rank() < CacheTier::Hot.rank());
    }

    #[test]
    fn test_promotion_is_one_step() {
        assert_eq!(CacheTier::Cold.promoted(), Some(CacheTier::Warm));
        assert_eq!(CacheTier::Warm.promoted(), Some(CacheTier::Hot));
        assert_eq!(CacheTier::Hot.promoted(), None);
        assert_eq!(CacheTier::Frozen.promoted(), None);
    }

    #[test]
    fn test_demotion_is_one_step() {
        assert_eq!(CacheTier::Hot.demoted(), Some(CacheTier::Warm));
        assert_eq!(CacheTier::Warm.demoted(), Some(CacheTier::Cold));
        assert_eq!(CacheTier::Cold.demoted(), None);
        assert_eq!(CacheTier::Frozen.demoted(), None);
    }

    #[test]
    fn test_tier_serializes_snake_case() {
        let json = serde_json::to_string(&CacheTier::Hot).expect("serialize");
        assert_eq!(json, "\"hot\"");
        assert_eq!(CacheTier::default(), CacheTier::Cold);
    }

    #[test]
    fn test_policy_promotion_threshold() {
        let policy = TieringPolicy::default();

        assert_eq!(policy.promotion_target(&entry_in(CacheTier::Cold, 4)), None);
        assert_eq!(
            policy.promotion_target(&entry_in(CacheTier::Cold, 5)),
            Some(CacheTier::Warm)
        );
        assert_eq!(
            policy.promotion_target(&entry_in(CacheTier::Warm, 9)),
            Some(CacheTier::Hot)
        );
        assert_eq!(policy.promotion_target(&entry_in(CacheTier::Hot, 100)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_demotion_requires_idle() {
        let policy = TieringPolicy::new(5, Duration::from_secs(10));
        let entry = entry_in(CacheTier::Hot, 0);

        assert_eq!(policy.demotion_target(&entry, Instant::now()), None);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(
            policy.demotion_target(&entry, Instant::now()),
            Some(CacheTier::Warm)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_idle_boundary_is_exclusive() {
        let policy = TieringPolicy::new(5, Duration::from_secs(10));
        let entry = entry_in(CacheTier::Cold, 50);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!policy.is_idle(&entry, Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(policy.is_idle(&entry, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_never_demotes_cold_or_frozen() {
        let policy = TieringPolicy::new(5, Duration::from_secs(1));
        let cold = entry_in(CacheTier::Cold, 0);
        let frozen = entry_in(CacheTier::Frozen, 0);

        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(policy.demotion_target(&cold, Instant::now()), None);
        assert_eq!(policy.demotion_target(&frozen, Instant::now()), None);
    }
}
