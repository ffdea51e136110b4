//! Metrics for cache observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for cache store activity.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Positive entries served.
    pub hits: AtomicU64,
    /// Lookups that found nothing usable.
    pub misses: AtomicU64,
    /// Negative entries served.
    pub negative_hits: AtomicU64,
    /// Successful writes.
    pub writes: AtomicU64,
    /// Backend calls that failed and were degraded.
    pub backend_errors: AtomicU64,
    /// Stored values that could not be decoded.
    pub decode_errors: AtomicU64,
    /// Total bytes written after encoding.
    pub bytes_written: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of cache metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub negative_hits: u64,
    pub writes: u64,
    pub backend_errors: u64,
    pub decode_errors: u64,
    pub bytes_written: u64,
}

impl CacheMetricsSnapshot {
    /// Hit rate over all lookups (0.0 to 1.0). Negative hits count as hits.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.negative_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
