//! Deployment settings: optional file plus `HERD__*` environment overrides.
//!
//! ```text
//! HERD__REDIS__URL=redis://cache:6379/0
//! HERD__RESOLVE__TTL_SECS=600
//! HERD__THROTTLE__MAX_CONCURRENCY=2
//! HERD__LOG__FORMAT=json
//! ```

use crate::options::ResolveOptions;
use config::{Config, Environment, File};
use herd_cache::{CodecConfig, RedisConfig};
use herd_core::{Error, NEGATIVE_TTL_SECONDS, Result};
use herd_throttle::ThrottleLimits;
use herd_trace::LogConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "HERD";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub resolve: ResolveSettings,
    #[serde(default)]
    pub throttle: ThrottleLimits,
    #[serde(default)]
    pub log: LogConfig,
}

/// Resolution defaults in plain numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_true")]
    pub serve_stale: bool,
    #[serde(default = "default_stale_ttl_divisor")]
    pub stale_ttl_divisor: u32,
    #[serde(default = "default_min_lock_ttl_secs")]
    pub min_lock_ttl_secs: u64,
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,
    #[serde(default = "default_negative_ttl_secs")]
    pub negative_ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_stale_ttl_divisor() -> u32 {
    10
}

fn default_min_lock_ttl_secs() -> u64 {
    10
}

fn default_lock_wait_ms() -> u64 {
    5_000
}

fn default_lock_poll_interval_ms() -> u64 {
    100
}

fn default_negative_ttl_secs() -> u64 {
    NEGATIVE_TTL_SECONDS
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            serve_stale: true,
            stale_ttl_divisor: default_stale_ttl_divisor(),
            min_lock_ttl_secs: default_min_lock_ttl_secs(),
            lock_wait_ms: default_lock_wait_ms(),
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            negative_ttl_secs: default_negative_ttl_secs(),
        }
    }
}

impl Settings {
    /// Load from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading variables from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env);

        builder
            .add_source(environment)
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        let resolve = &self.resolve;
        ResolveOptions {
            ttl: Duration::from_secs(resolve.ttl_secs),
            serve_stale: resolve.serve_stale,
            stale_ttl_divisor: resolve.stale_ttl_divisor,
            min_lock_ttl: Duration::from_secs(resolve.min_lock_ttl_secs),
            lock_wait: Duration::from_millis(resolve.lock_wait_ms),
            lock_poll_interval: Duration::from_millis(resolve.lock_poll_interval_ms),
            negative_ttl: Duration::from_secs(resolve.negative_ttl_secs),
            ..Default::default()
        }
    }

    pub fn throttle_limits(&self) -> ThrottleLimits {
        self.throttle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herd_cache::CompressionType;
    use herd_trace::LogFormat;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_with_env(None, env(&[])).unwrap();
        assert_eq!(settings.resolve, ResolveSettings::default());
        assert_eq!(settings.redis.url, "redis://localhost:6379");
        assert_eq!(settings.throttle_limits(), ThrottleLimits::default());

        let options = settings.resolve_options();
        assert_eq!(options.ttl, Duration::from_secs(300));
        assert_eq!(options.lock_wait, Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::load_with_env(
            None,
            env(&[
                ("HERD__RESOLVE__TTL_SECS", "600"),
                ("HERD__RESOLVE__SERVE_STALE", "false"),
                ("HERD__REDIS__URL", "redis://cache:6379/2"),
                ("HERD__THROTTLE__MAX_CONCURRENCY", "2"),
                ("HERD__LOG__FORMAT", "json"),
                ("OTHER__RESOLVE__TTL_SECS", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.resolve.ttl_secs, 600);
        assert!(!settings.resolve.serve_stale);
        assert_eq!(settings.redis.url, "redis://cache:6379/2");
        assert_eq!(settings.throttle.max_concurrency, 2);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert!(!settings.resolve_options().serve_stale);
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "resolve:\n  ttl_secs: 120\n  lock_wait_ms: 250\ncodec:\n  threshold_bytes: 1024\n  algorithm: lz4\n"
        )
        .unwrap();

        let settings = Settings::load_with_env(
            Some(file.path()),
            env(&[("HERD__RESOLVE__TTL_SECS", "90")]),
        )
        .unwrap();

        assert_eq!(settings.resolve.ttl_secs, 90);
        assert_eq!(settings.resolve.lock_wait_ms, 250);
        assert_eq!(settings.codec.threshold_bytes, 1024);
        assert_eq!(settings.codec.algorithm, CompressionType::Lz4);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Settings::load_with_env(Some(Path::new("/nonexistent/herd.yaml")), env(&[]));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
