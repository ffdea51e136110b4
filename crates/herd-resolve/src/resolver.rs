//! The resolution pipeline.
//!
//! Each call walks the same decision tree:
//!
//! 1. Cache probe. A negative entry returns its captured error; a positive
//!    entry returns its value.
//! 2. Durable store probe. A fresh record is served and promoted to the
//!    cache with the remaining TTL. A stale record is either served while a
//!    detached refresh runs, or skipped.
//! 3. Coordinated fetch. In-process singleflight wraps a distributed lock;
//!    the holder fetches and caches, everyone else adopts the holder's
//!    cache write. A loser that sees nothing within its wait window fetches
//!    on its own.
//! 4. Error path. Client errors may be negative-cached, then surface.

use crate::metrics::ResolveMetrics;
use crate::options::ResolveOptions;
use crate::outcome::{ResolveSource, Resolved};
use crate::source::ResourceSource;
use futures::FutureExt;
use herd_cache::{CacheLookup, CacheStore, ValueCodec, lock_key};
use herd_coord::{DistributedLock, Singleflight};
use herd_core::{CancelToken, Error, KvBackend, NegativeCacheEntry, Result, jitter};
use herd_trace::{lock_span, refresh_span, resolve_span};
use serde::Deserialize;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{Instrument, debug, error, warn};

/// Settled result of the shared fetch work for one key.
#[derive(Debug, Clone)]
struct FetchOutcome {
    value: Value,
    source: ResolveSource,
}

impl FetchOutcome {
    fn new(value: Value, source: ResolveSource) -> Self {
        Self { value, source }
    }
}

/// Cache-coordinated resolver. Cheap to clone; clones share the
/// singleflight table and metrics.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

struct Inner {
    store: CacheStore,
    lock: DistributedLock,
    flights: Singleflight<FetchOutcome>,
    metrics: Arc<ResolveMetrics>,
}

impl Resolver {
    /// Cache and lock over the same backend.
    pub fn new(backend: Arc<dyn KvBackend>, codec: ValueCodec) -> Self {
        let store = CacheStore::new(Arc::clone(&backend), codec);
        let lock = DistributedLock::new(backend);
        Self::from_parts(store, lock)
    }

    pub fn from_parts(store: CacheStore, lock: DistributedLock) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                lock,
                flights: Singleflight::new(),
                metrics: ResolveMetrics::new(),
            }),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    pub fn lock(&self) -> &DistributedLock {
        &self.inner.lock
    }

    pub fn metrics(&self) -> &Arc<ResolveMetrics> {
        &self.inner.metrics
    }

    /// Keys with a fetch in flight in this process.
    pub fn in_flight(&self) -> usize {
        self.inner.flights.in_flight()
    }

    /// Resolve `key` through cache, durable store and coordinated fetch.
    ///
    /// Cancelling `cancel` abandons this caller's wait. A fetch already in
    /// flight keeps running for the other callers sharing it and still
    /// writes its result to the cache.
    pub async fn resolve<S: ResourceSource>(
        &self,
        key: &str,
        source: Arc<S>,
        options: &ResolveOptions,
        cancel: &CancelToken,
    ) -> Result<Resolved<S::Output>> {
        let span = resolve_span(key);
        let resolved = self
            .resolve_inner(key, source, options, cancel)
            .instrument(span.clone())
            .await?;
        span.record("origin", resolved.source.as_str());
        Ok(resolved)
    }

    async fn resolve_inner<S: ResourceSource>(
        &self,
        key: &str,
        source: Arc<S>,
        options: &ResolveOptions,
        cancel: &CancelToken,
    ) -> Result<Resolved<S::Output>> {
        let lookup = cancel
            .run(async { Ok(self.inner.store.lookup(key).await) })
            .await?;
        match lookup {
            CacheLookup::Negative(entry) => {
                self.inner.metrics.record_negative_hit();
                return Err(Error::Upstream(entry.to_upstream()));
            }
            CacheLookup::Hit(value) => match serde_json::from_value::<S::Output>(value) {
                Ok(data) => return Ok(self.served(data, ResolveSource::Cache)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Cached value has unexpected shape, ignoring")
                }
            },
            CacheLookup::Miss => {}
        }

        if let Some(record) = cancel.run(source.get_from_db()).await? {
            let age = record.age();
            if age < options.ttl {
                let remaining = options.ttl - age;
                let data = source.assemble_from_db(&record, remaining)?;
                cancel
                    .run(async {
                        self.inner
                            .store
                            .set(key, &data, jitter(remaining.as_secs_f64()))
                            .await;
                        Ok(())
                    })
                    .await?;
                debug!(key = %key, age_secs = age.as_secs(), "Serving fresh durable record");
                return Ok(self.served(data, ResolveSource::DbFresh));
            }

            if options.serve_stale {
                let data = source.assemble_from_db(&record, options.stale_remaining_ttl())?;
                debug!(key = %key, age_secs = age.as_secs(), "Serving stale durable record, refreshing");
                self.spawn_refresh(key, source, options.clone());
                return Ok(self.served(data, ResolveSource::DbStale));
            }

            debug!(key = %key, age_secs = age.as_secs(), "Durable record stale, fetching");
        }

        let outcome = cancel
            .run(self.coordinated_fetch(key, source, options))
            .await?;
        let data = serde_json::from_value(outcome.value)?;
        Ok(self.served(data, outcome.source))
    }

    fn served<T>(&self, data: T, source: ResolveSource) -> Resolved<T> {
        self.inner.metrics.record_served(source);
        Resolved::new(data, source)
    }

    /// Join or start the shared fetch for `key`.
    async fn coordinated_fetch<S: ResourceSource>(
        &self,
        key: &str,
        source: Arc<S>,
        options: &ResolveOptions,
    ) -> Result<FetchOutcome> {
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let options = options.clone();
        self.inner
            .flights
            .run(key, move || async move {
                inner
                    .fetch_exclusive(&owned_key, source.as_ref(), &options)
                    .await
            })
            .await
    }

    /// Refresh `key` on a detached task. Failures are logged and, for
    /// client errors, negative-cached; nobody awaits the result.
    fn spawn_refresh<S: ResourceSource>(&self, key: &str, source: Arc<S>, options: ResolveOptions) {
        let resolver = self.clone();
        let key = key.to_string();
        let span = refresh_span(&key);

        tokio::spawn(
            async move {
                match resolver.coordinated_fetch(&key, source, &options).await {
                    Ok(outcome) => {
                        debug!(key = %key, source = %outcome.source, "Background refresh settled")
                    }
                    Err(e) => {
                        resolver.inner.metrics.record_refresh_failure();
                        warn!(key = %key, error = %e, "Background refresh failed");
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Drop the cached entry for `key`, positive or negative.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.inner.store.invalidate(key).await
    }
}

impl Inner {
    /// Fetch under the distributed lock, or defer to whoever holds it.
    async fn fetch_exclusive<S: ResourceSource>(
        &self,
        key: &str,
        source: &S,
        options: &ResolveOptions,
    ) -> Result<FetchOutcome> {
        let lock_key = lock_key(key);
        let Some(handle) = self.lock.acquire(&lock_key, options.lock_ttl()).await else {
            return self.fetch_contended(key, source, options).await;
        };
        self.metrics.record_lock_win();

        let result = AssertUnwindSafe(self.fetch_locked(key, source, options))
            .catch_unwind()
            .instrument(lock_span(&lock_key))
            .await
            .unwrap_or_else(|_| {
                error!(key = %key, "Fetch panicked while holding lock");
                Err(Error::Internal(format!("fetch for '{}' panicked", key)))
            });

        self.lock.release(&handle).await;
        result
    }

    async fn fetch_locked<S: ResourceSource>(
        &self,
        key: &str,
        source: &S,
        options: &ResolveOptions,
    ) -> Result<FetchOutcome> {
        // A previous holder may have finished between our probe and the lock.
        match self.store.lookup(key).await {
            CacheLookup::Hit(value) if adoptable::<S>(key, &value) => {
                debug!(key = %key, "Result cached by previous lock holder");
                self.metrics.record_adopted();
                return Ok(FetchOutcome::new(value, ResolveSource::Adopted));
            }
            CacheLookup::Negative(entry) => return Err(Error::Upstream(entry.to_upstream())),
            CacheLookup::Hit(_) | CacheLookup::Miss => {}
        }

        let value = self.fetch_and_store(key, source, options).await?;
        Ok(FetchOutcome::new(value, ResolveSource::Fetched))
    }

    async fn fetch_contended<S: ResourceSource>(
        &self,
        key: &str,
        source: &S,
        options: &ResolveOptions,
    ) -> Result<FetchOutcome> {
        // Shared work: callers abandon their own wait, never the flight.
        let waited = self
            .lock
            .wait_for_key(
                key,
                options.lock_wait,
                options.lock_poll_interval,
                &CancelToken::never(),
            )
            .await?;

        if let Some(stored) = waited {
            match self.store.decode_lookup(key, &stored) {
                CacheLookup::Hit(value) if adoptable::<S>(key, &value) => {
                    self.metrics.record_adopted();
                    return Ok(FetchOutcome::new(value, ResolveSource::Adopted));
                }
                CacheLookup::Negative(entry) => return Err(Error::Upstream(entry.to_upstream())),
                CacheLookup::Hit(_) | CacheLookup::Miss => {}
            }
        }

        debug!(key = %key, "No result from lock holder, fetching without lock");
        self.metrics.record_uncoordinated_fetch();
        let value = self.fetch_and_store(key, source, options).await?;
        Ok(FetchOutcome::new(value, ResolveSource::Fetched))
    }

    async fn fetch_and_store<S: ResourceSource>(
        &self,
        key: &str,
        source: &S,
        options: &ResolveOptions,
    ) -> Result<Value> {
        self.metrics.record_fetch();
        match source.fetch_persist().await {
            Ok(data) => {
                let value = serde_json::to_value(&data)?;
                self.store
                    .set(key, &value, jitter(options.ttl.as_secs_f64()))
                    .await;
                Ok(value)
            }
            Err(e) => {
                self.record_failure(key, &e, options).await;
                Err(e)
            }
        }
    }

    async fn record_failure(&self, key: &str, err: &Error, options: &ResolveOptions) {
        let Error::Upstream(upstream) = err else {
            return;
        };
        if !options
            .negative_cache
            .should_cache(upstream.status, &upstream.code)
        {
            debug!(key = %key, status = upstream.status, "Upstream failure not negative-cached");
            return;
        }
        let Some(entry) = NegativeCacheEntry::from_upstream(upstream) else {
            return;
        };
        if self
            .store
            .set_negative(key, &entry, options.negative_ttl_seconds())
            .await
        {
            debug!(key = %key, status = upstream.status, code = %upstream.code, "Negative-cached upstream failure");
            self.metrics.record_negative_write();
        }
    }
}

/// Whether a cached value decodes as the source's output. Values written
/// under the same key by another type are refetched, not adopted.
fn adoptable<S: ResourceSource>(key: &str, value: &Value) -> bool {
    match S::Output::deserialize(value) {
        Ok(_) => true,
        Err(e) => {
            warn!(key = %key, error = %e, "Cached value has unexpected shape, refetching");
            false
        }
    }
}
