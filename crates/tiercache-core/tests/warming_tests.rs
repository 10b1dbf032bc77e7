//! Warming integration tests.

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tiercache_core::{
    loader_fn, CacheLoader, CacheManager, CacheTier, Error, TierCacheConfig,
};
use tokio::sync::Notify;

fn warming_only() -> TierCacheConfig {
    let mut config = TierCacheConfig::default();
    config.maintenance.enabled = false;
    config
}

async fn started() -> Arc<CacheManager<String>> {
    let cache = Arc::new(CacheManager::new(warming_only()));
    cache.initialize().expect("initialize");
    cache
}

/// Polls `condition` until it holds, failing the test after ~5 seconds.
async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_warm_before_initialize_fails() {
    let cache = CacheManager::<String>::new(warming_only());
    let loader = loader_fn(|key: String| async move { Ok(key) });

    let result = cache.warm_cache(["a"], loader).await;

    assert!(matches!(result, Err(Error::NotRunning(_))));
}

#[tokio::test]
async fn test_warm_after_shutdown_fails() {
    let cache = started().await;
    cache.shutdown().await;
    let loader = loader_fn(|key: String| async move { Ok(key) });

    let result = cache.warm_cache(["a"], loader).await;

    assert!(matches!(result, Err(Error::NotRunning(_))));
}

#[tokio::test]
async fn test_warm_with_warming_disabled_fails() {
    let mut config = warming_only();
    config.warming.enabled = false;
    let cache = Arc::new(CacheManager::<String>::new(config));
    cache.initialize().expect("initialize");
    let loader = loader_fn(|key: String| async move { Ok(key) });

    let result = cache.warm_cache(["a"], loader).await;

    assert!(matches!(result, Err(Error::NotRunning(_))));
    cache.shutdown().await;
}

#[tokio::test]
async fn test_only_absent_keys_are_warmed_into_warm_tier() {
    // Arrange
    let cache = started().await;
    cache.set("a", "original".to_string());
    let loader = loader_fn(|key: String| async move { Ok(format!("loaded:{key}")) });

    // Act
    let enqueued = cache
        .warm_cache(["a", "b", "c"], loader)
        .await
        .expect("warm");
    wait_until(|| cache.contains_key("b") && cache.contains_key("c")).await;

    // Assert
    assert_eq!(enqueued, 2);
    assert_eq!(cache.get("a"), Some("original".to_string()));
    assert_eq!(cache.get("b"), Some("loaded:b".to_string()));
    assert_eq!(cache.entry_info("c").map(|i| i.tier), Some(CacheTier::Warm));
    assert_eq!(cache.metrics().warming_operations, 2);

    cache.shutdown().await;
}

#[tokio::test]
async fn test_loader_failures_are_counted_not_raised() {
    let cache = started().await;
    let loader = loader_fn(|key: String| async move {
        match key.as_str() {
            "bad" => Err(anyhow!("backend unavailable")),
            "boom" => panic!("loader bug"),
            _ => Ok(format!("loaded:{key}")),
        }
    });

    let enqueued = cache
        .warm_cache(["bad", "boom", "good"], loader)
        .await
        .expect("warm");
    wait_until(|| cache.contains_key("good")).await;

    assert_eq!(enqueued, 3);
    assert!(!cache.contains_key("bad"));
    assert!(!cache.contains_key("boom"));
    let metrics = cache.metrics();
    assert_eq!(metrics.warming_failures, 2);
    assert_eq!(metrics.warming_operations, 3);

    // The consumer survived the panic
    assert!(cache.is_running());
    cache.shutdown().await;
}

#[tokio::test]
async fn test_key_set_during_load_is_not_overwritten() {
    // Arrange
    let cache = started().await;
    let loading = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let slow = {
        let loading = Arc::clone(&loading);
        let release = Arc::clone(&release);
        loader_fn(move |key: String| {
            let loading = Arc::clone(&loading);
            let release = Arc::clone(&release);
            async move {
                loading.notify_one();
                release.notified().await;
                Ok(format!("stale:{key}"))
            }
        })
    };
    cache.warm_cache(["k"], slow).await.expect("warm");

    // Act: write the key while the loader is suspended
    loading.notified().await;
    cache.set("k", "fresh".to_string());
    release.notify_one();

    // The queue is FIFO, so once the marker lands `k` has been handled
    let marker = loader_fn(|_key: String| async move { Ok("marker".to_string()) });
    cache.warm_cache(["marker"], marker).await.expect("warm");
    wait_until(|| cache.contains_key("marker")).await;

    // Assert
    assert_eq!(cache.get("k"), Some("fresh".to_string()));
    assert_eq!(cache.entry_info("k").map(|i| i.tier), Some(CacheTier::Cold));

    cache.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_interrupts_pending_loader() {
    let cache = started().await;
    let loading = Arc::new(Notify::new());
    let pending = stalled_loader(&loading);
    cache.warm_cache(["stuck"], pending).await.expect("warm");
    loading.notified().await;

    let finished = tokio::time::timeout(Duration::from_secs(5), cache.shutdown()).await;

    assert!(finished.is_ok());
    assert!(!cache.contains_key("stuck"));
}

#[tokio::test]
async fn test_warming_operations_count_queued_keys() {
    // Arrange
    let cache = started().await;
    let loading = Arc::new(Notify::new());
    let pending = stalled_loader(&loading);

    // Act
    let enqueued = cache
        .warm_cache(["a", "b", "c"], pending)
        .await
        .expect("warm");
    loading.notified().await;
    cache.shutdown().await;

    // Assert
    assert_eq!(enqueued, 3);
    let metrics = cache.metrics();
    assert_eq!(metrics.warming_operations, 3);
    assert_eq!(metrics.warming_failures, 0);
    assert!(cache.is_empty());
}

/// Loader that signals `loading` and then never completes.
fn stalled_loader(loading: &Arc<Notify>) -> Arc<dyn CacheLoader<String>> {
    let loading = Arc::clone(loading);
    loader_fn(move |_key: String| {
        let loading = Arc::clone(&loading);
        async move {
            loading.notify_one();
            std::future::pending::<()>().await;
            Ok("never".to_string())
        }
    })
}

struct CountingLoader {
    calls: AtomicUsize,
}

#[async_trait]
impl CacheLoader<String> for CountingLoader {
    async fn load(&self, key: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(key.to_uppercase())
    }
}

#[tokio::test]
async fn test_stateful_loader_trait_object() {
    let cache = started().await;
    let loader = Arc::new(CountingLoader {
        calls: AtomicUsize::new(0),
    });

    cache
        .warm_cache(vec!["x".to_string(), "y".to_string()], loader.clone())
        .await
        .expect("warm");
    wait_until(|| cache.contains_key("x") && cache.contains_key("y")).await;

    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.get("y"), Some("Y".to_string()));

    cache.shutdown().await;
}
