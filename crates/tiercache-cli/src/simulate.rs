//! Synthetic workload driver.
//!
//! Populates a cache with rendered pages, reads them with a skewed access
//! pattern, warms extra pages in the background, invalidates by dependency and
//! tag, then runs one maintenance pass.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiercache_core::{
    loader_fn, CacheManager, Error, MaintenanceReport, PerformanceReport, SetOptions,
    TierCacheConfig,
};

/// Users whose pages share a dependency.
const USER_GROUPS: usize = 10;
/// Sections whose pages share a tag.
const SECTIONS: usize = 5;

/// Dependency invalidated after the read phase.
pub const INVALIDATED_DEPENDENCY: &str = "user:0";
/// Tag invalidated after the read phase.
pub const INVALIDATED_TAG: &str = "section:1";

/// Workload size parameters.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    pub keys: usize,
    pub reads: usize,
    pub warm: usize,
}

/// Everything the report prints.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub keys: usize,
    pub reads: usize,
    pub warm_enqueued: usize,
    pub warm_loaded: usize,
    pub dependency_invalidated: usize,
    pub tag_invalidated: usize,
    pub maintenance: MaintenanceReport,
    pub elapsed_ms: u64,
    pub report: PerformanceReport,
}

pub fn page_key(index: usize) -> String {
    format!("page:{index}")
}

pub fn render_page(key: &str) -> String {
    format!("<html><body><h1>{key}</h1><p>rendered</p></body></html>")
}

/// Key for the `i`-th read.
///
/// Four reads in five go to the first tenth of the key space; one read in
/// twenty asks for a key that was never set.
pub fn read_key(i: usize, keys: usize) -> String {
    let keys = keys.max(1);
    let hot_span = (keys / 10).max(1);
    let index = if i % 20 == 19 {
        keys + i
    } else if i % 5 < 4 {
        i % hot_span
    } else {
        i % keys
    };
    page_key(index)
}

/// Runs the workload against a fresh manager built from `config`.
pub async fn run(config: TierCacheConfig, workload: &Workload) -> anyhow::Result<Outcome> {
    let started = Instant::now();
    let cache = Arc::new(CacheManager::<String>::try_new(config)?);
    cache.initialize()?;

    populate(&cache, workload.keys);

    for i in 0..workload.reads {
        let _ = cache.get(&read_key(i, workload.keys));
    }

    let (warm_enqueued, warm_loaded) = warm(&cache, workload).await?;

    let dependency_invalidated = cache.invalidate_by_dependency(INVALIDATED_DEPENDENCY).len();
    let tag_invalidated = cache.invalidate_by_tags([INVALIDATED_TAG]).len();
    let maintenance = cache.run_maintenance();

    let report = cache.get_performance_report();
    cache.shutdown().await;

    tracing::info!(
        keys = workload.keys,
        reads = workload.reads,
        hit_rate = report.lifetime_hit_rate,
        "Simulation finished"
    );

    Ok(Outcome {
        keys: workload.keys,
        reads: workload.reads,
        warm_enqueued,
        warm_loaded,
        dependency_invalidated,
        tag_invalidated,
        maintenance,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        report,
    })
}

fn populate(cache: &CacheManager<String>, keys: usize) {
    for index in 0..keys {
        let key = page_key(index);
        let value = render_page(&key);
        cache.set_with(
            key,
            value,
            SetOptions::new()
                .depends_on(format!("user:{}", index % USER_GROUPS))
                .tag(format!("section:{}", index % SECTIONS)),
        );
    }
}

/// Warms `workload.warm` keys past the populated range.
///
/// Returns `(enqueued, loaded)`. Warming disabled in the configuration is not
/// an error for the simulation.
async fn warm(cache: &CacheManager<String>, workload: &Workload) -> anyhow::Result<(usize, usize)> {
    if workload.warm == 0 {
        return Ok((0, 0));
    }

    let keys: Vec<String> = (workload.keys..workload.keys + workload.warm)
        .map(page_key)
        .collect();
    let loader = loader_fn(|key: String| async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Ok(render_page(&key))
    });

    let enqueued = match cache.warm_cache(keys.clone(), loader).await {
        Ok(enqueued) => enqueued,
        Err(Error::NotRunning(reason)) => {
            tracing::warn!(reason = reason.as_str(), "Skipping warm phase");
            return Ok((0, 0));
        }
        Err(e) => return Err(e.into()),
    };

    let loaded = || keys.iter().filter(|key| cache.contains_key(key)).count();
    for _ in 0..500 {
        if loaded() >= enqueued {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Ok((enqueued, loaded()))
}
