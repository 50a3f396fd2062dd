//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

/// Upper bound for any computed delay, so deadlines never overflow.
const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Delay before attempt `attempt` (1-based): `base * factor^(attempt-1)`,
/// capped at `max` when given.
pub fn exponential_delay(attempt: u32, base: Duration, factor: f64, max: Option<Duration>) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = base.as_millis() as f64 * factor.powi(exponent);
    let delay = if delay_ms.is_finite() && delay_ms < MAX_DELAY.as_millis() as f64 {
        Duration::from_millis(delay_ms as u64)
    } else {
        MAX_DELAY
    };

    match max {
        Some(cap) => delay.min(cap),
        None => delay,
    }
}

/// Reconnect delay for attempt `attempt`: `base * 2^(attempt-1)`.
pub fn reconnect_delay(attempt: u32, base: Duration, max: Option<Duration>) -> Duration {
    exponential_delay(attempt, base, 2.0, max)
}

/// Add up to `ratio * delay` of random jitter. A ratio of zero is a no-op.
pub fn with_jitter(delay: Duration, ratio: f64) -> Duration {
    let jitter_range = (delay.as_millis() as f64 * ratio.clamp(0.0, 1.0)) as u64;
    if jitter_range == 0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0..jitter_range);
    delay + Duration::from_millis(jitter)
}
