//! Span helpers with consistent field names.

use tracing::{Level, Span, span};

/// Span for one resolution of `key`.
pub fn resolve_span(key: &str) -> Span {
    span!(Level::INFO, "herd.resolve", cache.key = key, origin = tracing::field::Empty)
}

/// Span for the detached refresh that follows a stale read.
pub fn refresh_span(key: &str) -> Span {
    span!(Level::INFO, "herd.refresh", cache.key = key)
}

pub fn lock_span(lock_key: &str) -> Span {
    span!(Level::DEBUG, "herd.lock", lock.key = lock_key)
}

pub fn batch_span(size: usize, concurrency: usize) -> Span {
    span!(
        Level::INFO,
        "herd.batch",
        batch.size = size,
        batch.concurrency = concurrency,
    )
}
