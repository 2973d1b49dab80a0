//! Exponential suspension backoff.

use std::time::Duration;

/// Duration of the next suspension.
///
/// The first suspension lasts `initial`; each consecutive one doubles the
/// previous duration, capped at `max`.
pub fn next_suspend_duration(previous: Option<Duration>, initial: Duration, max: Duration) -> Duration {
    match previous {
        None => initial.min(max),
        Some(previous) => previous.saturating_mul(2).min(max),
    }
}
