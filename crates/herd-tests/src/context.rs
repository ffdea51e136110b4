//! Test context wiring a backend into resolvers.

use crate::containers::RedisContainer;
use herd_cache::{CodecConfig, MemoryBackend, RedisBackend, RedisConfig, ValueCodec};
use herd_core::KvBackend;
use herd_resolve::Resolver;
use std::sync::Arc;

/// A shared backend plus whatever keeps it alive.
///
/// Every [`TestContext::resolver`] call builds an independent resolver with
/// its own singleflight table, standing in for a separate process sharing
/// the same cache.
pub struct TestContext {
    pub backend: Arc<dyn KvBackend>,
    pub memory: Option<Arc<MemoryBackend>>,
    pub redis: Option<RedisContainer>,
    codec: ValueCodec,
}

impl TestContext {
    /// In-process backend. No Docker required.
    pub fn memory() -> Self {
        crate::init_test_logging();

        let memory = Arc::new(MemoryBackend::new());
        Self {
            backend: memory.clone(),
            memory: Some(memory),
            redis: None,
            codec: ValueCodec::default(),
        }
    }

    /// Real Redis in a container.
    pub async fn redis() -> anyhow::Result<Self> {
        crate::init_test_logging();

        let redis = RedisContainer::start().await?;
        let backend = RedisBackend::connect(RedisConfig::new(redis.url())).await?;

        Ok(Self {
            backend: Arc::new(backend),
            memory: None,
            redis: Some(redis),
            codec: ValueCodec::default(),
        })
    }

    pub fn with_codec(mut self, config: CodecConfig) -> Self {
        self.codec = ValueCodec::new(config);
        self
    }

    /// A fresh resolver over the shared backend.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.backend.clone(), self.codec.clone())
    }
}
