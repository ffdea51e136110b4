//! Distributed lock over the shared key-value backend.
//!
//! A lock is a key holding a random token with a TTL. Acquire is an atomic
//! set-if-absent, release an atomic compare-and-delete, so a holder whose
//! lease already expired can never delete a newer holder's lock. A crashed
//! holder's lock disappears when its TTL runs out.
//!
//! Backend failures never surface: `acquire` and `wait_for_key` report
//! "nothing" and `release` reports `false`, leaving the caller to proceed
//! uncoordinated.

use crate::metrics::LockMetrics;
use herd_core::{CancelToken, KvBackend, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Proof of ownership for an acquired lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    key: String,
    token: String,
    ttl: Duration,
}

impl LockHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[derive(Clone)]
pub struct DistributedLock {
    backend: Arc<dyn KvBackend>,
    metrics: Arc<LockMetrics>,
}

impl DistributedLock {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            metrics: LockMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<LockMetrics> {
        &self.metrics
    }

    /// Try to take `lock_key` for `ttl`. Never blocks.
    ///
    /// Returns `None` when the lock is held elsewhere or the backend is
    /// unreachable.
    pub async fn acquire(&self, lock_key: &str, ttl: Duration) -> Option<LockHandle> {
        let token = Uuid::new_v4().to_string();
        let ttl_millis = (ttl.as_millis() as u64).max(1);

        match self
            .backend
            .set_if_absent(lock_key, token.as_bytes(), ttl_millis)
            .await
        {
            Ok(true) => {
                debug!(lock_key = %lock_key, ttl_ms = ttl_millis, "Lock acquired");
                self.metrics.record_acquired();
                Some(LockHandle {
                    key: lock_key.to_string(),
                    token,
                    ttl,
                })
            }
            Ok(false) => {
                debug!(lock_key = %lock_key, "Lock held elsewhere");
                self.metrics.record_contended();
                None
            }
            Err(e) => {
                warn!(lock_key = %lock_key, error = %e, "Lock backend unreachable, proceeding without lock");
                self.metrics.record_backend_error();
                None
            }
        }
    }

    /// Release a lock this process holds.
    pub async fn release(&self, handle: &LockHandle) -> bool {
        self.release_token(&handle.key, &handle.token).await
    }

    /// Delete `lock_key` only if it still holds `token`.
    pub async fn release_token(&self, lock_key: &str, token: &str) -> bool {
        match self
            .backend
            .compare_and_delete(lock_key, token.as_bytes())
            .await
        {
            Ok(true) => {
                debug!(lock_key = %lock_key, "Lock released");
                self.metrics.record_released();
                true
            }
            Ok(false) => {
                debug!(lock_key = %lock_key, "Lock not released: expired or held by another token");
                self.metrics.record_release_mismatch();
                false
            }
            Err(e) => {
                warn!(lock_key = %lock_key, error = %e, "Lock release failed, lease will expire");
                self.metrics.record_backend_error();
                false
            }
        }
    }

    /// Poll `result_key` (not the lock) until a value appears or `timeout`
    /// elapses, so a loser can adopt the winner's output.
    ///
    /// Returns `Ok(None)` on timeout or backend failure and
    /// `Err(Cancelled)` if `cancel` fires while waiting.
    pub async fn wait_for_key(
        &self,
        result_key: &str,
        timeout: Duration,
        poll_interval: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<u8>>> {
        let started = Instant::now();
        let poll_interval = poll_interval.max(Duration::from_millis(1));

        loop {
            cancel.check()?;
            match self.backend.get(result_key).await {
                Ok(Some(value)) => {
                    debug!(
                        key = %result_key,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Adopting result written by lock holder"
                    );
                    self.metrics.record_wait_adopted();
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %result_key, error = %e, "Backend unreachable while waiting for result");
                    self.metrics.record_backend_error();
                    return Ok(None);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!(key = %result_key, "Gave up waiting for lock holder");
                self.metrics.record_wait_timed_out();
                return Ok(None);
            }
            cancel.sleep(poll_interval.min(timeout - elapsed)).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herd_cache::MemoryBackend;
    use herd_core::{CancelSource, Error};

    const TTL: Duration = Duration::from_secs(10);

    fn lock_with(backend: Arc<MemoryBackend>) -> DistributedLock {
        DistributedLock::new(backend)
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let lock = lock_with(Arc::new(MemoryBackend::new()));

        let first = lock.acquire("book:1:_lock", TTL).await;
        assert!(first.is_some());
        assert!(lock.acquire("book:1:_lock", TTL).await.is_none());

        let handle = first.unwrap();
        assert!(lock.release(&handle).await);
        assert!(lock.acquire("book:1:_lock", TTL).await.is_some());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let lock = lock_with(Arc::new(MemoryBackend::new()));
        let a = lock.acquire("a", TTL).await.unwrap();
        let b = lock.acquire("b", TTL).await.unwrap();
        assert_ne!(a.token(), b.token());
        assert_eq!(a.key(), "a");
        assert_eq!(a.ttl(), TTL);
    }

    #[tokio::test]
    async fn test_wrong_token_does_not_release() {
        let backend = Arc::new(MemoryBackend::new());
        let lock = lock_with(backend.clone());

        let handle = lock.acquire("L", TTL).await.unwrap();
        assert!(!lock.release_token("L", "not-the-token").await);
        assert!(lock.acquire("L", TTL).await.is_none());
        assert!(lock.release(&handle).await);
        assert_eq!(lock.metrics().snapshot().release_mismatches, 1);
    }

    #[tokio::test]
    async fn test_expired_holder_cannot_release_new_holder() {
        let lock = lock_with(Arc::new(MemoryBackend::new()));

        let stale = lock.acquire("L", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let fresh = lock.acquire("L", TTL).await.unwrap();
        assert!(!lock.release(&stale).await);
        assert!(lock.acquire("L", TTL).await.is_none());
        assert!(lock.release(&fresh).await);
    }

    #[tokio::test]
    async fn test_backend_outage_degrades() {
        let backend = Arc::new(MemoryBackend::new());
        let lock = lock_with(backend.clone());
        let handle = lock.acquire("L", TTL).await.unwrap();

        backend.set_available(false);
        assert!(lock.acquire("other", TTL).await.is_none());
        assert!(!lock.release(&handle).await);
        let waited = lock
            .wait_for_key("k", Duration::from_secs(5), Duration::from_millis(10), &CancelToken::never())
            .await
            .unwrap();
        assert!(waited.is_none());
        assert_eq!(lock.metrics().snapshot().backend_errors, 3);
    }

    #[tokio::test]
    async fn test_wait_for_key_adopts_value() {
        let backend = Arc::new(MemoryBackend::new());
        let lock = lock_with(backend.clone());

        let writer = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            writer.set("book:1", b"{\"title\":\"Dune\"}", 60).await.unwrap();
        });

        let value = lock
            .wait_for_key("book:1", Duration::from_secs(2), Duration::from_millis(5), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(value, Some(b"{\"title\":\"Dune\"}".to_vec()));
    }

    #[tokio::test]
    async fn test_wait_for_key_times_out() {
        let lock = lock_with(Arc::new(MemoryBackend::new()));
        let started = Instant::now();
        let value = lock
            .wait_for_key("never", Duration::from_millis(50), Duration::from_millis(10), &CancelToken::never())
            .await
            .unwrap();
        assert!(value.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wait_for_key_cancelled() {
        let lock = lock_with(Arc::new(MemoryBackend::new()));
        let source = CancelSource::new();
        let token = source.token();

        let waiter = tokio::spawn(async move {
            lock.wait_for_key("never", Duration::from_secs(30), Duration::from_millis(10), &token)
                .await
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        source.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait aborts promptly")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
