//! Testcontainer configurations for integration tests.

use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Redis container shared by cache and lock tests.
pub struct RedisContainer {
    #[allow(dead_code)] // Kept to maintain container lifetime
    container: ContainerAsync<Redis>,
    url: String,
}

impl RedisContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = Redis::default().with_tag("7-alpine").start().await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(6379).await?;

        let url = format!("redis://{}:{}", host, port);

        Ok(Self { container, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
