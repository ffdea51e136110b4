//! Coordination primitives: a lease-style distributed lock over the shared
//! key-value backend, and in-process singleflight.

pub mod lock;
pub mod metrics;
pub mod singleflight;

pub use lock::{DistributedLock, LockHandle};
pub use metrics::{LockMetrics, LockMetricsSnapshot};
pub use singleflight::Singleflight;
