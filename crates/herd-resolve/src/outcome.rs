//! Successful resolution result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveSource {
    /// Positive entry in the shared cache.
    Cache,
    /// Durable record younger than the TTL.
    DbFresh,
    /// Durable record past its TTL; a background refresh was started.
    DbStale,
    /// Fetched from the remote source by this process.
    Fetched,
    /// Written to the cache by another lock holder while we waited.
    Adopted,
}

impl ResolveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveSource::Cache => "cache",
            ResolveSource::DbFresh => "db_fresh",
            ResolveSource::DbStale => "db_stale",
            ResolveSource::Fetched => "fetched",
            ResolveSource::Adopted => "adopted",
        }
    }
}

impl fmt::Display for ResolveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub data: T,
    pub source: ResolveSource,
}

impl<T> Resolved<T> {
    pub fn new(data: T, source: ResolveSource) -> Self {
        Self { data, source }
    }

    pub fn into_data(self) -> T {
        self.data
    }
}
