//! Durable store record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A record read from the durable store through a caller-supplied accessor.
///
/// The core only reads these; upserts happen inside the caller's
/// `fetch_persist` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord<T> {
    pub payload: T,
    pub updated_at: DateTime<Utc>,
}

impl<T> DurableRecord<T> {
    pub fn new(payload: T, updated_at: DateTime<Utc>) -> Self {
        Self { payload, updated_at }
    }

    /// Age relative to `now`. Timestamps in the future count as age zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }
}
