//! Shared cache for herd: value codec, backends and the typed store.

pub mod backend;
pub mod codec;
pub mod compression;
pub mod health;
pub mod keys;
pub mod metrics;
pub mod redis_backend;
pub mod store;

pub use backend::MemoryBackend;
pub use codec::{COMPRESSION_MARKER, CodecConfig, DEFAULT_COMPRESSION_THRESHOLD, ValueCodec};
pub use compression::{CompressionType, compress, decompress};
pub use health::{HealthCheck, HealthStatus};
pub use keys::{hashed_key, lock_key, namespaced, sanitize_key};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use redis_backend::{RedisBackend, RedisConfig};
pub use store::{CacheLookup, CacheStore};
