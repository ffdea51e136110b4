//! herd core
//!
//! Shared vocabulary for the herd cache-coordination layer: the error
//! taxonomy, the key-value backend port, durable record shape, TTL jitter,
//! the negative-cache marker and the cancellation token threaded through
//! every public entry point. This crate has minimal dependencies.

pub mod cancel;
pub mod error;
pub mod jitter;
pub mod negative;
pub mod ports;
pub mod record;

pub use cancel::{CancelSource, CancelToken};
pub use error::{Error, ErrorKind, Result, UpstreamError, is_client_status};
pub use jitter::{jitter, jitter_with};
pub use negative::{NEGATIVE_MARKER, NEGATIVE_TTL_SECONDS, NegativeCacheEntry, is_negative, make_negative};
pub use ports::KvBackend;
pub use record::DurableRecord;
