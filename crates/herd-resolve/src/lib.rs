//! Stale-while-revalidate resolution for herd.
//!
//! [`Resolver`] resolves one logical resource through
//! cache → durable store → coordinated fetch → cache, composing the shared
//! cache, the distributed lock, in-process singleflight and the negative
//! cache. The durable store and the remote source are supplied by the caller
//! as a [`ResourceSource`].
//!
//! # Usage
//!
//! ```ignore
//! use herd_resolve::{ResolveOptions, Resolver};
//!
//! let resolver = Resolver::new(backend, ValueCodec::default());
//! let resolved = resolver
//!     .resolve("book:42", source, &ResolveOptions::default(), &CancelToken::never())
//!     .await?;
//! println!("{:?} from {}", resolved.data, resolved.source);
//! ```

pub mod batch;
pub mod metrics;
pub mod options;
pub mod outcome;
pub mod resolver;
pub mod settings;
pub mod source;

pub use batch::{BatchItem, BatchOutcome};
pub use metrics::{ResolveMetrics, ResolveMetricsSnapshot};
pub use options::{NegativeCachePolicy, ResolveOptions};
pub use outcome::{ResolveSource, Resolved};
pub use resolver::Resolver;
pub use settings::{ResolveSettings, Settings};
pub use source::ResourceSource;
