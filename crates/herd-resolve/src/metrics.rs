//! Resolution metrics.

use crate::outcome::ResolveSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ResolveMetrics {
    pub cache_hits: AtomicU64,
    pub negative_hits: AtomicU64,
    pub db_fresh: AtomicU64,
    pub db_stale: AtomicU64,
    pub fetches: AtomicU64,
    pub lock_wins: AtomicU64,
    pub adopted: AtomicU64,
    /// Fetches made without holding the lock after the wait window ran out.
    pub uncoordinated_fetches: AtomicU64,
    pub negative_writes: AtomicU64,
    pub refresh_failures: AtomicU64,
}

impl ResolveMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Count a value served straight from cache or durable store. Fetches
    /// and adoptions are counted where the shared work happens.
    pub fn record_served(&self, source: ResolveSource) {
        let counter = match source {
            ResolveSource::Cache => &self.cache_hits,
            ResolveSource::DbFresh => &self.db_fresh,
            ResolveSource::DbStale => &self.db_stale,
            ResolveSource::Fetched | ResolveSource::Adopted => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adopted(&self) {
        self.adopted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_win(&self) {
        self.lock_wins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_uncoordinated_fetch(&self) {
        self.uncoordinated_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_negative_write(&self) {
        self.negative_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResolveMetricsSnapshot {
        ResolveMetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            db_fresh: self.db_fresh.load(Ordering::Relaxed),
            db_stale: self.db_stale.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            lock_wins: self.lock_wins.load(Ordering::Relaxed),
            adopted: self.adopted.load(Ordering::Relaxed),
            uncoordinated_fetches: self.uncoordinated_fetches.load(Ordering::Relaxed),
            negative_writes: self.negative_writes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveMetricsSnapshot {
    pub cache_hits: u64,
    pub negative_hits: u64,
    pub db_fresh: u64,
    pub db_stale: u64,
    pub fetches: u64,
    pub lock_wins: u64,
    pub adopted: u64,
    pub uncoordinated_fetches: u64,
    pub negative_writes: u64,
    pub refresh_failures: u64,
}
