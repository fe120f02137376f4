//! Read-only query collaborators feeding the pipeline, and the bounded-staleness
//! cache in front of them. The pipeline itself never caches.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::types::{CatalogEntry, SalesSnapshot};

pub trait SnapshotSource: Send + Sync {
    /// Every stored snapshot row, in storage order.
    fn fetch_snapshots(&self) -> impl Future<Output = Result<Vec<SalesSnapshot>>> + Send;

    /// Every catalog row, in storage order.
    fn fetch_catalog(&self) -> impl Future<Output = Result<Vec<CatalogEntry>>> + Send;
}

/// One cached query result and when it was fetched.
struct Slot<T> {
    fetched_at: Instant,
    value: Arc<Vec<T>>,
}

struct QueryCache<T> {
    slot: Mutex<Option<Slot<T>>>,
}

impl<T> QueryCache<T> {
    fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// Serve the cached value while younger than `ttl`, else run `fetch`.
    /// The lock is held across the fetch so concurrent callers share one query.
    async fn get_or_fetch<F, Fut>(&self, name: &str, ttl: Duration, fetch: F) -> Result<Arc<Vec<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            let age = cached.fetched_at.elapsed();
            if age < ttl {
                debug!(query = name, age_ms = age.as_millis() as u64, "Serving cached query result");
                return Ok(Arc::clone(&cached.value));
            }
        }

        let value = Arc::new(fetch().await?);
        debug!(query = name, rows = value.len(), "Query result refreshed");
        *slot = Some(Slot {
            fetched_at: Instant::now(),
            value: Arc::clone(&value),
        });
        Ok(value)
    }
}

/// Wraps a source so results are reused for up to `ttl`. A zero TTL always refetches.
/// A failed fetch leaves the previous cached value untouched.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    snapshots: QueryCache<SalesSnapshot>,
    catalog: QueryCache<CatalogEntry>,
}

impl<S: SnapshotSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            snapshots: QueryCache::new(),
            catalog: QueryCache::new(),
        }
    }

    pub async fn snapshots(&self) -> Result<Arc<Vec<SalesSnapshot>>> {
        self.snapshots
            .get_or_fetch("snapshots", self.ttl, || self.inner.fetch_snapshots())
            .await
    }

    pub async fn catalog(&self) -> Result<Arc<Vec<CatalogEntry>>> {
        self.catalog
            .get_or_fetch("catalog", self.ttl, || self.inner.fetch_catalog())
            .await
    }
}

#[cfg(test)]
impl<S> CachedSource<S> {
    pub(crate) fn inner(&self) -> &S {
        &self.inner
    }
}
