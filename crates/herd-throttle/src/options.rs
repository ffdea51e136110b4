//! Throttle configuration and clamping.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pacing for a single `throttle_map` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleOptions {
    /// Number of workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Lower bound of the random pause before each item.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Upper bound of the random pause before each item.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_concurrency() -> usize {
    3
}

fn default_min_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    600
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ThrottleOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay_ms = min.as_millis() as u64;
        self.max_delay_ms = max.as_millis() as u64;
        self
    }

    /// No pacing at all. Meant for tests and trusted internal batches.
    pub fn unpaced(concurrency: usize) -> Self {
        Self {
            concurrency,
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Worker count, never zero.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Delay bounds with `max >= min` enforced.
    pub fn delay_bounds(&self) -> (u64, u64) {
        (self.min_delay_ms, self.max_delay_ms.max(self.min_delay_ms))
    }
}

/// Hard caps imposed by a call site on caller-provided options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleLimits {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_min_delay_floor_ms")]
    pub min_delay_floor_ms: u64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_min_delay_floor_ms() -> u64 {
    100
}

impl Default for ThrottleLimits {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            min_delay_floor_ms: default_min_delay_floor_ms(),
        }
    }
}

impl ThrottleLimits {
    pub fn new(max_concurrency: usize, min_delay_floor: Duration) -> Self {
        Self {
            max_concurrency,
            min_delay_floor_ms: min_delay_floor.as_millis() as u64,
        }
    }
}

/// Tighten `requested` so it respects `limits`.
///
/// Concurrency lands in `1..=max_concurrency`; both delay bounds are raised
/// to at least the floor and `max >= min` holds afterwards.
pub fn clamp_options(requested: ThrottleOptions, limits: &ThrottleLimits) -> ThrottleOptions {
    let max_concurrency = limits.max_concurrency.max(1);
    let min_delay_ms = requested.min_delay_ms.max(limits.min_delay_floor_ms);
    let max_delay_ms = requested.max_delay_ms.max(min_delay_ms);

    ThrottleOptions {
        concurrency: requested.concurrency.clamp(1, max_concurrency),
        min_delay_ms,
        max_delay_ms,
    }
}
