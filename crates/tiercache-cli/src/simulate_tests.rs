//! Tests for the simulation driver.

use crate::report;
use crate::simulate::{self, read_key, Workload};
use tiercache_core::TierCacheConfig;

#[test]
fn test_read_key_skews_toward_hot_span() {
    let keys = 100;

    let hot = (0..1000)
        .map(|i| read_key(i, keys))
        .filter(|key| {
            key.trim_start_matches("page:")
                .parse::<usize>()
                .is_ok_and(|index| index < 10)
        })
        .count();

    assert!(hot >= 700, "expected most reads in the hot span, got {hot}");
}

#[test]
fn test_read_key_produces_misses() {
    let key = read_key(19, 50);

    assert_eq!(key, "page:69");
}

#[test]
fn test_read_key_handles_empty_key_space() {
    assert_eq!(read_key(0, 0), "page:0");
}

#[tokio::test]
async fn test_simulation_end_to_end() {
    // Arrange
    let mut config = TierCacheConfig::default();
    config.maintenance.enabled = false;
    let workload = Workload {
        keys: 50,
        reads: 400,
        warm: 5,
    };

    // Act
    let outcome = simulate::run(config, &workload).await.expect("simulation");

    // Assert
    assert_eq!(outcome.keys, 50);
    assert_eq!(outcome.warm_enqueued, 5);
    assert_eq!(outcome.warm_loaded, 5);
    // user:0 owns pages 0, 10, 20, 30, 40
    assert_eq!(outcome.dependency_invalidated, 5);
    assert!(outcome.tag_invalidated > 0);
    let metrics = &outcome.report.stats.metrics;
    assert!(metrics.hits > metrics.misses);
    assert_eq!(metrics.warming_operations, 5);

    let json = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(json["keys"], 50);
    assert!(report::tier_table(&outcome).to_string().contains("total"));
}

#[tokio::test]
async fn test_simulation_without_warming() {
    let mut config = TierCacheConfig::default();
    config.warming.enabled = false;
    let workload = Workload {
        keys: 10,
        reads: 20,
        warm: 3,
    };

    let outcome = simulate::run(config, &workload).await.expect("simulation");

    assert_eq!(outcome.warm_enqueued, 0);
    assert_eq!(outcome.warm_loaded, 0);
}
