//! In-process coalescing of concurrent identical async calls.
//!
//! The first caller for a key spawns the work; callers arriving while it is
//! in flight await the same shared result. The entry is removed by the
//! spawned task itself once the work settles, so removal happens even when
//! every waiter has gone away, and the next call starts fresh.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use herd_core::{Error, Result};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;

pub struct Singleflight<T> {
    flights: Arc<DashMap<String, Flight<T>>>,
}

impl<T> Singleflight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Run `f` for `key`, or join the call already in flight for it.
    ///
    /// The work runs on its own task: dropping this future stops waiting
    /// but does not abort the work other callers may be sharing.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let flight = match self.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                debug!(key = %key, "Joining in-flight call");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let flight = self.launch(key.to_string(), f());
                entry.insert(flight.clone());
                flight
            }
        };
        flight.await
    }

    fn launch<Fut>(&self, key: String, work: Fut) -> Flight<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let flights = Arc::clone(&self.flights);
        let handle = tokio::spawn(async move {
            let out = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(out) => out,
                Err(_) => {
                    error!(key = %key, "Singleflight work panicked");
                    Err(Error::Internal(format!("call for '{}' panicked", key)))
                }
            };
            flights.remove(&key);
            out
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(Error::Internal(format!("singleflight task failed: {}", e))))
        }
        .boxed()
        .shared()
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.flights.contains_key(key)
    }
}

impl<T> Default for Singleflight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Singleflight<T> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
        }
    }
}
