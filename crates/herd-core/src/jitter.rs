//! TTL jitter.
//!
//! Entries cached at the same instant with the same nominal TTL would
//! otherwise all expire together and stampede the source.

use rand::Rng;

/// Fraction of the TTL the result may deviate by in either direction.
const JITTER_FRACTION: f64 = 0.1;

/// Randomize `ttl_seconds` by up to ±10%, floored, never below 1.
///
/// Non-finite or non-positive input is treated as 1.
pub fn jitter(ttl_seconds: f64) -> u64 {
    jitter_with(ttl_seconds, &mut rand::thread_rng())
}

/// Same as [`jitter`] with an explicit random source.
pub fn jitter_with<R: Rng + ?Sized>(ttl_seconds: f64, rng: &mut R) -> u64 {
    let ttl = if ttl_seconds.is_finite() && ttl_seconds > 0.0 {
        ttl_seconds
    } else {
        1.0
    };
    let spread = ttl * JITTER_FRACTION;
    let offset = rng.gen_range(-spread..=spread);
    let low = (ttl * (1.0 - JITTER_FRACTION)).floor();
    let high = (ttl * (1.0 + JITTER_FRACTION)).ceil();
    let jittered = (ttl + offset).floor().clamp(low, high);
    if jittered < 1.0 { 1 } else { jittered as u64 }
}
