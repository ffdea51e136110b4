//! Port traits (hexagonal architecture).
//!
//! The cache/lock backend is the only cross-process mutable state the core
//! touches. Adapters live in `herd-cache`.

use crate::Result;
use async_trait::async_trait;

/// Shared key-value store used both as the volatile cache and as the lock
/// backend.
///
/// Every method may fail with [`crate::Error::BackendUnavailable`]; callers
/// in the core degrade rather than surface that error.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value with a TTL in seconds.
    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()>;

    /// Atomic set-if-absent with a TTL in milliseconds.
    /// Returns `true` when this call created the key.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl_millis: u64) -> Result<bool>;

    /// Atomic compare-and-delete: removes `key` only if its value equals
    /// `expected`. Must be a single server-side operation.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool>;

    /// Remove a key unconditionally.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}
