//! Redis implementation of the key-value backend.

use async_trait::async_trait;
use herd_core::{Error, KvBackend, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Delete `KEYS[1]` only if it still holds `ARGV[1]`.
const COMPARE_AND_DELETE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

/// Configuration for the Redis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://localhost:6379/0`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Upper bound on any single command; exceeding it counts as unreachable.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_command_timeout_ms() -> u64 {
    1_000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Redis-backed [`KvBackend`] over an auto-reconnecting connection manager.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    compare_and_delete: redis::Script,
    config: RedisConfig,
}

impl RedisBackend {
    /// Connect to Redis.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str()).map_err(backend_error)?;
        let conn = tokio::time::timeout(config.command_timeout(), ConnectionManager::new(client))
            .await
            .map_err(|_| Error::BackendUnavailable("Timed out connecting to Redis".into()))?
            .map_err(backend_error)?;

        info!("Connected to Redis");

        Ok(Self {
            conn,
            compare_and_delete: redis::Script::new(COMPARE_AND_DELETE_SCRIPT),
            config,
        })
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.config.command_timeout(), fut)
            .await
            .map_err(|_| Error::BackendUnavailable("Redis command timed out".into()))?
            .map_err(backend_error)
    }
}

fn backend_error(err: redis::RedisError) -> Error {
    Error::BackendUnavailable(format!("Redis error: {}", err))
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        self.bounded(conn.get::<_, Option<Vec<u8>>>(key)).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl_seconds.max(1)))
            .await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl_millis: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis.max(1));
        let reply: Option<String> = self.bounded(cmd.query_async(&mut conn)).await?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.compare_and_delete.key(key);
        invocation.arg(expected);
        let deleted: i64 = self.bounded(invocation.invoke_async(&mut conn)).await?;
        Ok(deleted == 1)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.bounded(conn.del::<_, ()>(key)).await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }
}
