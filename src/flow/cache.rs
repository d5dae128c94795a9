//! Result caching decorator.
//!
//! [`Cached`] returns the stored result for an argument key instead of
//! invoking the wrapped operation while the entry is fresh. Entries are
//! keyed by positional element-wise equality of the argument value and
//! backed by a bounded [moka](moka::sync::Cache) cache, so stale entries
//! are dropped (not merely ignored) once their time-to-live passes.
//!
//! A fresh hit has no side effect and emits no signals — the rest of the
//! pipeline never learns the call happened. Only `Ok` results populate
//! the cache; a failed invocation leaves no entry behind.
//!
//! # Concurrent misses
//!
//! Lookups are exclusive per instance, but the downstream invocation on
//! a miss is not serialized: two concurrent misses for the same key may
//! both invoke the wrapped operation and the later insert wins. There is
//! deliberately no single-flight deduplication; callers needing it can
//! layer their own.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::signal::{self, Signals};
use super::Operation;
use crate::telemetry;
use crate::Result;

/// Upper bound on entries per cache instance, to keep long-running
/// processes from growing without limit.
const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// How long a cached result stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTime {
    /// Entries expire after the given duration.
    Ttl(Duration),
    /// Entries never expire.
    Forever,
}

/// Decorator that caches the wrapped operation's results per argument key.
pub struct Cached<A, T> {
    inner: Arc<dyn Operation<A, T>>,
    store: moka::sync::Cache<A, T>,
    caching_time: CacheTime,
    signals: Arc<Signals<A, T>>,
}

impl<A, T> Cached<A, T>
where
    A: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Wrap an operation with a result cache.
    pub fn new(inner: Arc<dyn Operation<A, T>>, caching_time: CacheTime) -> Self {
        let mut builder = moka::sync::Cache::builder().max_capacity(DEFAULT_MAX_ENTRIES);
        if let CacheTime::Ttl(ttl) = caching_time {
            builder = builder.time_to_live(ttl);
        }

        let signals = Arc::new(Signals::new());
        signal::forward(inner.signals(), &signals);

        Self {
            inner,
            store: builder.build(),
            caching_time,
            signals,
        }
    }

    /// Whether a fresh entry exists for the given arguments.
    ///
    /// Rate gates use this as their bypass predicate so a guaranteed
    /// hit never waits on a rate limit.
    pub fn has(&self, args: &A) -> bool {
        self.store.contains_key(args)
    }

    /// The configured freshness window.
    pub fn caching_time(&self) -> CacheTime {
        self.caching_time
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.store.invalidate_all();
    }
}

#[async_trait]
impl<A, T> Operation<A, T> for Cached<A, T>
where
    A: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    async fn invoke(&self, args: A) -> Result<T> {
        if let Some(hit) = self.store.get(&args) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
            return Ok(hit);
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);

        let result = self.inner.invoke(args.clone()).await?;
        self.store.insert(args, result.clone());
        Ok(result)
    }

    fn signals(&self) -> &Signals<A, T> {
        &self.signals
    }
}
