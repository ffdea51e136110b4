//! Structured logging for herd.
//!
//! Provides subscriber setup driven by [`LogConfig`] and span helpers that
//! carry the cache key through a resolution, its lock and batch work.

pub mod logging;
pub mod spans;

pub use logging::{LogConfig, LogFormat, TraceError, init_tracing};
pub use spans::{batch_span, lock_span, refresh_span, resolve_span};
