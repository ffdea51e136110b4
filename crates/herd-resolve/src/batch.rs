//! Paced resolution of many ids in one call.

use crate::options::ResolveOptions;
use crate::resolver::Resolver;
use crate::source::ResourceSource;
use herd_core::{CancelToken, Error, Result, UpstreamError};
use herd_throttle::{ThrottleOptions, throttle_map};
use herd_trace::batch_span;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Per-id outcome. Serialized as `{"id", "result"}` or `{"id", "error"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem<T> {
    pub id: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome<T> {
    Result(T),
    Error(UpstreamError),
}

impl<T> BatchItem<T> {
    pub fn ok(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            outcome: BatchOutcome::Result(data),
        }
    }

    pub fn err(id: impl Into<String>, error: UpstreamError) -> Self {
        Self {
            id: id.into(),
            outcome: BatchOutcome::Error(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Result(_))
    }

    pub fn data(&self) -> Option<&T> {
        match &self.outcome {
            BatchOutcome::Result(data) => Some(data),
            BatchOutcome::Error(_) => None,
        }
    }
}

impl Resolver {
    /// Resolve every id through [`Resolver::resolve`], paced by `throttle`.
    ///
    /// `make_source` maps an id to its cache key and collaborators. Upstream
    /// failures are captured per item; cancellation fails the whole batch.
    pub async fn resolve_batch<S, F>(
        &self,
        ids: Vec<String>,
        make_source: F,
        options: &ResolveOptions,
        throttle: ThrottleOptions,
        cancel: &CancelToken,
    ) -> Result<Vec<BatchItem<S::Output>>>
    where
        S: ResourceSource,
        F: Fn(&str) -> (String, Arc<S>),
    {
        let span = batch_span(ids.len(), throttle.effective_concurrency());

        let items = throttle_map(
            ids,
            |id, _index| {
                let (key, source) = make_source(&id);
                async move {
                    match self.resolve(&key, source, options, cancel).await {
                        Ok(resolved) => Ok(BatchItem::ok(id, resolved.data)),
                        Err(Error::Cancelled) => Err(Error::Cancelled),
                        Err(e) => {
                            debug!(id = %id, error = %e, "Batch item failed");
                            Ok(BatchItem::err(id, e.to_upstream()))
                        }
                    }
                }
            },
            throttle,
            cancel,
        )
        .instrument(span)
        .await?;

        Ok(items)
    }
}
