//! Exponential backoff for empty-queue polling.

use rand::Rng;
use std::time::Duration;

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;

/// Base delay for the first miss, in milliseconds.
const BACKOFF_FACTOR_MS: u64 = 100;

/// Exponent ceiling; beyond this the doubling has long since saturated the cap.
const MAX_EXPONENT: u32 = 32;

/// Compute the next poll delay after a run of consecutive misses
///
/// Returns the incremented miss count together with a jittered delay. The
/// delay doubles per miss up to `max_backoff` and is spread over the upper
/// half of that ceiling (half fixed, half random) so that multiple consumers
/// polling one queue drift apart instead of synchronizing.
pub fn compute_backoff(misses: u32, max_backoff: Duration) -> (u32, Duration) {
    let ceiling = backoff_ceiling(misses, max_backoff);
    let half = ceiling / 2;
    let jitter = rand::rng().random_range(Duration::ZERO..=half);
    (misses.saturating_add(1), half + jitter)
}

/// Deterministic delay ceiling for a given miss count
fn backoff_ceiling(misses: u32, max_backoff: Duration) -> Duration {
    let exponent = misses.min(MAX_EXPONENT);
    let raw_ms = BACKOFF_FACTOR_MS.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(raw_ms).min(max_backoff)
}
