//! Lock metrics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LockMetrics {
    pub acquired: AtomicU64,
    pub contended: AtomicU64,
    pub released: AtomicU64,
    /// Releases refused because the lease expired or changed hands.
    pub release_mismatches: AtomicU64,
    pub backend_errors: AtomicU64,
    pub waits_adopted: AtomicU64,
    pub waits_timed_out: AtomicU64,
}

impl LockMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_contended(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release_mismatch(&self) {
        self.release_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait_adopted(&self) {
        self.waits_adopted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wait_timed_out(&self) {
        self.waits_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LockMetricsSnapshot {
        LockMetricsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            release_mismatches: self.release_mismatches.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            waits_adopted: self.waits_adopted.load(Ordering::Relaxed),
            waits_timed_out: self.waits_timed_out.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockMetricsSnapshot {
    pub acquired: u64,
    pub contended: u64,
    pub released: u64,
    pub release_mismatches: u64,
    pub backend_errors: u64,
    pub waits_adopted: u64,
    pub waits_timed_out: u64,
}
