//! Typed JSON cache store.
//!
//! Every backend failure degrades: reads become misses, writes become
//! no-ops. Nothing here surfaces `BackendUnavailable` to the caller.

use crate::codec::ValueCodec;
use crate::health::HealthCheck;
use crate::metrics::CacheMetrics;
use herd_core::{KvBackend, NegativeCacheEntry, Result, is_negative};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a cache probe.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Value),
    Negative(NegativeCacheEntry),
    Miss,
}

impl CacheLookup {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }
}

#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    codec: ValueCodec,
    metrics: Arc<CacheMetrics>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KvBackend>, codec: ValueCodec) -> Self {
        Self {
            backend,
            codec,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Probe `key`.
    pub async fn lookup(&self, key: &str) -> CacheLookup {
        match self.backend.get(key).await {
            Ok(Some(stored)) => self.decode_lookup(key, &stored),
            Ok(None) => {
                self.metrics.record_miss();
                CacheLookup::Miss
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                self.metrics.record_backend_error();
                self.metrics.record_miss();
                CacheLookup::Miss
            }
        }
    }

    /// Interpret bytes already read from the backend.
    pub fn decode_lookup(&self, key: &str, stored: &[u8]) -> CacheLookup {
        let value = match self.decode_value(stored) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable cache entry, treating as miss");
                self.metrics.record_decode_error();
                self.metrics.record_miss();
                return CacheLookup::Miss;
            }
        };

        if is_negative(&value) {
            return match NegativeCacheEntry::from_value(&value) {
                Some(entry) => {
                    debug!(key = %key, status = entry.status, "Negative cache hit");
                    self.metrics.record_negative_hit();
                    CacheLookup::Negative(entry)
                }
                None => {
                    warn!(key = %key, "Malformed negative cache entry, treating as miss");
                    self.metrics.record_decode_error();
                    self.metrics.record_miss();
                    CacheLookup::Miss
                }
            };
        }

        debug!(key = %key, "Cache hit");
        self.metrics.record_hit();
        CacheLookup::Hit(value)
    }

    fn decode_value(&self, stored: &[u8]) -> Result<Value> {
        let raw = self.codec.decode(stored)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Write a positive entry. Returns whether the write landed.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_seconds: u64) -> bool {
        let encoded = match serde_json::to_vec(value)
            .map_err(herd_core::Error::from)
            .and_then(|raw| self.codec.encode(&raw))
        {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache value");
                return false;
            }
        };
        self.write(key, &encoded, ttl_seconds).await
    }

    /// Write a negative entry with its own TTL.
    pub async fn set_negative(&self, key: &str, entry: &NegativeCacheEntry, ttl_seconds: u64) -> bool {
        self.set(key, &entry.to_value(), ttl_seconds).await
    }

    async fn write(&self, key: &str, encoded: &[u8], ttl_seconds: u64) -> bool {
        match self.backend.set(key, encoded, ttl_seconds).await {
            Ok(()) => {
                debug!(key = %key, ttl_seconds, bytes = encoded.len(), "Cache write");
                self.metrics.record_write(encoded.len() as u64);
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed, continuing without cache");
                self.metrics.record_backend_error();
                false
            }
        }
    }

    /// Drop a cached entry. Returns whether the delete landed.
    pub async fn invalidate(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache invalidation failed");
                self.metrics.record_backend_error();
                false
            }
        }
    }

    pub async fn health_check(&self) -> HealthCheck {
        let probe = self.backend.ping().await.map_err(|e| e.to_string());
        HealthCheck::from_probe(&self.metrics.snapshot(), probe)
    }
}
