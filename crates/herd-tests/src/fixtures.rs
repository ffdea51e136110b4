//! Resource sources with observable side effects.

use async_trait::async_trait;
use chrono::Utc;
use herd_core::{DurableRecord, Error, Result};
use herd_resolve::ResourceSource;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Payload served by the fixture sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub body: String,
    pub valid_secs: u64,
}

impl Listing {
    pub fn new(id: &str, title: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            title: title.into(),
            body: String::new(),
            valid_secs: 0,
        }
    }
}

fn record_aged(title: &str, age: Duration) -> DurableRecord<String> {
    let age = chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
    DurableRecord::new(title.to_string(), Utc::now() - age)
}

fn assemble(id: &str, record: &DurableRecord<String>, remaining: Duration) -> Listing {
    Listing {
        valid_secs: remaining.as_secs(),
        ..Listing::new(id, record.payload.clone())
    }
}

/// Source whose fetch always succeeds and counts invocations.
///
/// Sources built with the same counter (see [`CountingSource::with_counter`])
/// report a combined count, which is how tests observe fetches across
/// several resolvers.
pub struct CountingSource {
    id: String,
    record: Option<DurableRecord<String>>,
    delay: Duration,
    body_len: usize,
    fetches: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            record: None,
            delay: Duration::ZERO,
            body_len: 0,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Durable record with `title`, last updated `age` ago.
    pub fn with_record(mut self, title: &str, age: Duration) -> Self {
        self.record = Some(record_aged(title, age));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Pad fetched bodies to `len` bytes.
    pub fn with_body_len(mut self, len: usize) -> Self {
        self.body_len = len;
        self
    }

    pub fn with_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.fetches = counter;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceSource for CountingSource {
    type Record = String;
    type Output = Listing;

    async fn get_from_db(&self) -> Result<Option<DurableRecord<String>>> {
        Ok(self.record.clone())
    }

    fn assemble_from_db(&self, record: &DurableRecord<String>, remaining: Duration) -> Result<Listing> {
        Ok(assemble(&self.id, record, remaining))
    }

    async fn fetch_persist(&self) -> Result<Listing> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Listing {
            body: "x".repeat(self.body_len),
            valid_secs: 300,
            ..Listing::new(&self.id, format!("fetch #{}", n))
        })
    }
}

/// Source that replays a scripted sequence of fetch replies.
pub struct ScriptedSource {
    id: String,
    record: Option<DurableRecord<String>>,
    replies: Mutex<VecDeque<Result<Listing>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            record: None,
            replies: Mutex::new(VecDeque::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_record(mut self, title: &str, age: Duration) -> Self {
        self.record = Some(record_aged(title, age));
        self
    }

    pub fn then_succeed(mut self, title: &str) -> Self {
        let listing = Listing::new(&self.id, title);
        self.replies.get_mut().push_back(Ok(listing));
        self
    }

    pub fn then_fail(mut self, status: u16, code: &str) -> Self {
        self.replies
            .get_mut()
            .push_back(Err(Error::upstream("scripted failure", code, status)));
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceSource for ScriptedSource {
    type Record = String;
    type Output = Listing;

    async fn get_from_db(&self) -> Result<Option<DurableRecord<String>>> {
        Ok(self.record.clone())
    }

    fn assemble_from_db(&self, record: &DurableRecord<String>, remaining: Duration) -> Result<Listing> {
        Ok(assemble(&self.id, record, remaining))
    }

    async fn fetch_persist(&self) -> Result<Listing> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(Error::Internal("script exhausted".into())))
    }
}
