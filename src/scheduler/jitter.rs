//! Interval jitter.

use rand::Rng;
use std::time::Duration;

/// Maximum deviation from the nominal interval, as a fraction.
pub const JITTER_FACTOR: f64 = 0.05;

/// Return `interval` adjusted by a random amount within ±5%.
///
/// Re-rolled on every call so that many instances probing the same
/// dependency drift apart instead of firing together.
pub fn calc_interval_with_jitter(interval: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(-JITTER_FACTOR..=JITTER_FACTOR);
    interval.mul_f64(1.0 + factor)
}
