//! Caller-supplied collaborators for one resource.

use async_trait::async_trait;
use herd_core::{DurableRecord, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Access to the durable store and the remote source for one resource.
///
/// The resolver never writes the durable store itself: persisting is part of
/// [`fetch_persist`](ResourceSource::fetch_persist).
#[async_trait]
pub trait ResourceSource: Send + Sync + 'static {
    /// Row shape stored in the durable store.
    type Record: Send + Sync;
    /// Response shape handed to callers and written to the cache.
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Read the durable record, if any.
    async fn get_from_db(&self) -> Result<Option<DurableRecord<Self::Record>>>;

    /// Build a response from a durable record. `remaining_ttl` is how long
    /// the response should be considered valid.
    fn assemble_from_db(
        &self,
        record: &DurableRecord<Self::Record>,
        remaining_ttl: Duration,
    ) -> Result<Self::Output>;

    /// Call the remote source and persist the result durably.
    async fn fetch_persist(&self) -> Result<Self::Output>;
}
