//! In-process key-value backend.
//!
//! Honors TTLs and the atomic semantics of [`KvBackend`]. Used for local
//! development, single-process deployments and tests; the availability
//! switch simulates a backend outage. Expired slots are dropped when read
//! and swept periodically on write.

use async_trait::async_trait;
use herd_core::{Error, KvBackend, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Expired slots are swept once every this many writes.
const SWEEP_EVERY_WRITES: u64 = 64;

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug)]
pub struct MemoryBackend {
    slots: Mutex<HashMap<String, Slot>>,
    available: AtomicBool,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        }
    }

    /// Toggle simulated reachability. While unavailable every call fails
    /// with [`Error::BackendUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Remaining TTL of a live key.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let slots = self.slots.lock().await;
        slots
            .get(key)
            .filter(|slot| slot.is_live(now))
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired slots every [`SWEEP_EVERY_WRITES`] writes, so keys that
    /// are never read again do not accumulate.
    fn sweep_if_due(&self, slots: &mut HashMap<String, Slot>, now: Instant) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            slots.retain(|_, slot| slot.is_live(now));
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::BackendUnavailable("memory backend marked unavailable".into()))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut slots = self.slots.lock().await;
        match slots.get(key) {
            Some(slot) if slot.is_live(now) => Ok(Some(slot.value.clone())),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        self.ensure_available()?;
        let now = Instant::now();
        let slot = Slot {
            value: value.to_vec(),
            expires_at: Some(now + Duration::from_secs(ttl_seconds.max(1))),
        };
        let mut slots = self.slots.lock().await;
        self.sweep_if_due(&mut slots, now);
        slots.insert(key.to_string(), slot);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl_millis: u64) -> Result<bool> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut slots = self.slots.lock().await;
        if slots.get(key).is_some_and(|slot| slot.is_live(now)) {
            return Ok(false);
        }
        self.sweep_if_due(&mut slots, now);
        slots.insert(
            key.to_string(),
            Slot {
                value: value.to_vec(),
                expires_at: Some(now + Duration::from_millis(ttl_millis.max(1))),
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut slots = self.slots.lock().await;
        let matches = slots
            .get(key)
            .is_some_and(|slot| slot.is_live(now) && slot.value == expected);
        if matches {
            slots.remove(key);
        }
        Ok(matches)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_available()?;
        self.slots.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }
}
