//! Proactive cache warming.
//!
//! `warm_cache` only enqueues. A single consumer task drains the queue, calls
//! the loader for each key and stores successful results in the `Warm` tier.
//! Loader failures and panics are counted and logged, never propagated.

use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::manager::{CacheManager, SetOptions};
use super::metrics::CacheMetrics;
use super::size::EstimateSize;
use super::tier::CacheTier;
use crate::error::{Error, Result};

/// Produces a value for a key that is being warmed.
///
/// Implement this for loaders with state (a database handle, an HTTP client).
/// For a plain async function or closure, use [`loader_fn`].
#[async_trait]
pub trait CacheLoader<V>: Send + Sync {
    /// Loads the value for `key`.
    ///
    /// # Errors
    ///
    /// Any error marks this warming request as failed; the key stays absent.
    async fn load(&self, key: &str) -> anyhow::Result<V>;
}

/// Adapter that turns an async closure into a [`CacheLoader`].
pub struct FnLoader<F> {
    f: F,
}

#[async_trait]
impl<V, F, Fut> CacheLoader<V> for FnLoader<F>
where
    V: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    async fn load(&self, key: &str) -> anyhow::Result<V> {
        (self.f)(key.to_string()).await
    }
}

/// Wraps an async closure as a shareable loader.
///
/// ```rust,ignore
/// let loader = loader_fn(|key: String| async move { Ok(format!("value for {key}")) });
/// cache.warm_cache(["a", "b"], loader).await?;
/// ```
pub fn loader_fn<V, F, Fut>(f: F) -> Arc<dyn CacheLoader<V>>
where
    V: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    Arc::new(FnLoader { f })
}

/// One queued warming job.
pub(crate) struct WarmRequest<V> {
    pub(crate) key: String,
    pub(crate) loader: Arc<dyn CacheLoader<V>>,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + EstimateSize + 'static,
{
    /// Queues every key not currently present for background loading.
    ///
    /// Returns how many keys were enqueued; each one counts as a warming
    /// operation. Waits for queue capacity when the queue is full; loading
    /// itself happens later, on the consumer task.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotRunning` if the manager is not initialized, has been
    /// shut down, or has warming disabled.
    pub async fn warm_cache<I, S>(&self, keys: I, loader: Arc<dyn CacheLoader<V>>) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sender = self
            .warm_tx
            .read()
            .clone()
            .ok_or_else(|| Error::NotRunning("warming consumer is not running".to_string()))?;

        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|key| !self.contains_key(key))
            .collect();

        let mut enqueued = 0;
        for key in keys {
            let request = WarmRequest {
                key,
                loader: Arc::clone(&loader),
            };
            sender
                .send(request)
                .await
                .map_err(|_| Error::NotRunning("warming queue is closed".to_string()))?;
            CacheMetrics::incr(&self.metrics.warming_operations);
            enqueued += 1;
        }

        tracing::debug!(enqueued, "Queued keys for warming");
        Ok(enqueued)
    }

    /// Handles one dequeued request.
    async fn warm_one(&self, request: WarmRequest<V>) {
        let WarmRequest { key, loader } = request;

        if self.contains_key(&key) {
            tracing::trace!(key = key.as_str(), "Key already present, skipping warm");
            return;
        }

        match AssertUnwindSafe(loader.load(&key)).catch_unwind().await {
            Ok(Ok(value)) => {
                let options = SetOptions::new().tier(CacheTier::Warm);
                if self.insert_if_absent(key.clone(), value, options) {
                    tracing::trace!(key = key.as_str(), "Warmed entry");
                } else {
                    tracing::trace!(key = key.as_str(), "Key set during load, discarding warmed value");
                }
            }
            Ok(Err(e)) => {
                CacheMetrics::incr(&self.metrics.warming_failures);
                tracing::debug!(key = key.as_str(), error = %e, "Warming loader failed");
            }
            Err(_) => {
                CacheMetrics::incr(&self.metrics.warming_failures);
                tracing::warn!(key = key.as_str(), "Warming loader panicked");
            }
        }
    }
}

/// Drains the warming queue until shutdown is signalled or the queue closes.
pub(crate) async fn run_consumer<V>(
    manager: Arc<CacheManager<V>>,
    mut queue: mpsc::Receiver<WarmRequest<V>>,
    mut shutdown: watch::Receiver<bool>,
) where
    V: Clone + Send + Sync + EstimateSize + 'static,
{
    tracing::debug!("Warming consumer started");

    loop {
        let request = tokio::select! {
            _ = shutdown.changed() => break,
            request = queue.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            () = manager.warm_one(request) => {}
        }
    }

    tracing::debug!("Warming consumer stopped");
}
