//! Per-call resolution options.

use herd_core::{NEGATIVE_TTL_SECONDS, is_client_status};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Predicate = Arc<dyn Fn(u16, &str) -> bool + Send + Sync>;

/// Which upstream failures are written to the negative cache.
///
/// Only client errors are ever eligible: a `Custom` predicate can narrow
/// that set but never widen it to transient failures.
#[derive(Clone, Default)]
pub enum NegativeCachePolicy {
    Never,
    #[default]
    ClientErrors,
    Custom(Predicate),
}

impl NegativeCachePolicy {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(u16, &str) -> bool + Send + Sync + 'static,
    {
        NegativeCachePolicy::Custom(Arc::new(predicate))
    }

    pub fn should_cache(&self, status: u16, code: &str) -> bool {
        if !is_client_status(status) {
            return false;
        }
        match self {
            NegativeCachePolicy::Never => false,
            NegativeCachePolicy::ClientErrors => true,
            NegativeCachePolicy::Custom(predicate) => predicate(status, code),
        }
    }
}

impl fmt::Debug for NegativeCachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegativeCachePolicy::Never => f.write_str("Never"),
            NegativeCachePolicy::ClientErrors => f.write_str("ClientErrors"),
            NegativeCachePolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Nominal freshness of a resource.
    pub ttl: Duration,
    /// Serve a stale durable record while refreshing in the background.
    pub serve_stale: bool,
    /// A stale response is assembled as if `ttl / stale_ttl_divisor` remained.
    pub stale_ttl_divisor: u32,
    /// Lower bound on the fetch lock lease.
    pub min_lock_ttl: Duration,
    /// How long a lock loser polls for the winner's result.
    pub lock_wait: Duration,
    pub lock_poll_interval: Duration,
    pub negative_ttl: Duration,
    pub negative_cache: NegativeCachePolicy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            serve_stale: true,
            stale_ttl_divisor: 10,
            min_lock_ttl: Duration::from_secs(10),
            lock_wait: Duration::from_secs(5),
            lock_poll_interval: Duration::from_millis(100),
            negative_ttl: Duration::from_secs(NEGATIVE_TTL_SECONDS),
            negative_cache: NegativeCachePolicy::default(),
        }
    }
}

impl ResolveOptions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_serve_stale(mut self, serve_stale: bool) -> Self {
        self.serve_stale = serve_stale;
        self
    }

    pub fn with_lock_wait(mut self, wait: Duration, poll_interval: Duration) -> Self {
        self.lock_wait = wait;
        self.lock_poll_interval = poll_interval;
        self
    }

    pub fn with_min_lock_ttl(mut self, ttl: Duration) -> Self {
        self.min_lock_ttl = ttl;
        self
    }

    /// Lifetime of negative entries. Capped at half of `ttl` when written,
    /// see [`ResolveOptions::negative_ttl_seconds`].
    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    pub fn with_negative_cache(mut self, policy: NegativeCachePolicy) -> Self {
        self.negative_cache = policy;
        self
    }

    /// Lease for the fetch lock: never shorter than the fetch it guards
    /// is expected to be useful for.
    pub fn lock_ttl(&self) -> Duration {
        self.ttl.max(self.min_lock_ttl)
    }

    /// Remaining TTL assumed when assembling a stale response.
    pub fn stale_remaining_ttl(&self) -> Duration {
        (self.ttl / self.stale_ttl_divisor.max(1)).max(Duration::from_secs(1))
    }

    /// Seconds a negative entry lives: `negative_ttl`, at most half of
    /// `ttl`, never below one second.
    pub fn negative_ttl_seconds(&self) -> u64 {
        self.negative_ttl
            .min(self.ttl / 2)
            .as_secs()
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ResolveOptions::default();
        assert_eq!(options.ttl, Duration::from_secs(300));
        assert!(options.serve_stale);
        assert_eq!(options.lock_ttl(), Duration::from_secs(300));
        assert_eq!(options.stale_remaining_ttl(), Duration::from_secs(30));
        assert_eq!(options.negative_ttl_seconds(), 60);
    }

    #[test]
    fn test_negative_ttl_capped_by_positive_ttl() {
        let options = ResolveOptions::new(Duration::from_secs(30)).with_negative_ttl(Duration::from_secs(600));
        assert_eq!(options.negative_ttl_seconds(), 15);

        let options = ResolveOptions::new(Duration::from_secs(1)).with_negative_ttl(Duration::from_secs(60));
        assert_eq!(options.negative_ttl_seconds(), 1);

        let options = ResolveOptions::new(Duration::from_secs(600)).with_negative_ttl(Duration::from_secs(20));
        assert_eq!(options.negative_ttl_seconds(), 20);
    }

    #[test]
    fn test_lock_ttl_floor() {
        let options = ResolveOptions::new(Duration::from_secs(2));
        assert_eq!(options.lock_ttl(), Duration::from_secs(10));
    }

    #[test]
    fn test_stale_ttl_never_zero() {
        let mut options = ResolveOptions::new(Duration::from_secs(5));
        options.stale_ttl_divisor = 0;
        assert_eq!(options.stale_remaining_ttl(), Duration::from_secs(5));
        options.stale_ttl_divisor = 100;
        assert_eq!(options.stale_remaining_ttl(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_policy_caches_client_errors_only() {
        let policy = NegativeCachePolicy::default();
        assert!(policy.should_cache(400, "BAD_REQUEST"));
        assert!(policy.should_cache(404, "NOT_FOUND"));
        assert!(!policy.should_cache(429, "RATE_LIMITED"));
        assert!(!policy.should_cache(408, "TIMEOUT"));
        assert!(!policy.should_cache(503, "UNAVAILABLE"));
    }

    #[test]
    fn test_custom_policy_cannot_cache_transient() {
        let policy = NegativeCachePolicy::custom(|_, _| true);
        assert!(policy.should_cache(404, "NOT_FOUND"));
        assert!(!policy.should_cache(500, "INTERNAL"));

        let only_not_found = NegativeCachePolicy::custom(|status, _| status == 404);
        assert!(!only_not_found.should_cache(400, "BAD_REQUEST"));
        assert!(!NegativeCachePolicy::Never.should_cache(404, "NOT_FOUND"));
    }
}
