//! Integration test infrastructure for herd.
//!
//! Suites run against an in-process [`MemoryBackend`](herd_cache::MemoryBackend)
//! by default. With the `integration` feature they also run against a real
//! Redis started through testcontainers.
//!
//! # Usage
//!
//! ```ignore
//! use herd_tests::TestContext;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::redis().await.unwrap();
//!     let resolver = ctx.resolver();
//! }
//! ```

pub mod containers;
pub mod context;
pub mod fixtures;

pub use context::TestContext;
pub use fixtures::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,herd_resolve=debug,herd_coord=debug")),
        )
        .with_test_writer()
        .try_init();
}
