//! Timing helpers.
//!
//! Every signal envelope and orchestration report carries elapsed
//! milliseconds; these helpers keep the conversions in one place.

use std::time::{Duration, Instant};

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
pub fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds elapsed since `start`.
pub fn elapsed_ms(start: Instant) -> u64 {
    duration_to_ms(start.elapsed())
}
