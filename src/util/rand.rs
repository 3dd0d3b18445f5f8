//! Randomization utilities

use rand::Rng;
use std::time::Duration;

/// Base wait plus a uniform random extra in `0..=max_jitter_secs`
pub fn jitter(base: Duration, max_jitter_secs: u64) -> Duration {
    if max_jitter_secs == 0 {
        return base;
    }
    let mut rng = rand::thread_rng();
    let extra: u64 = rng.gen_range(0..=max_jitter_secs);
    base + Duration::from_secs(extra)
}
