//! Throttled batch mapping.
//!
//! Bulk fetches against a rate-limited source go through a small pool of
//! workers that pull from a shared cursor and pause a random interval
//! before each item, so the source sees a steady trickle rather than a
//! burst.

pub mod mapper;
pub mod options;

pub use mapper::throttle_map;
pub use options::{ThrottleLimits, ThrottleOptions, clamp_options};
