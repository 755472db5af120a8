//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if the nanosecond count overflows
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Number of seconds by which `elapsed` exceeds `period`, or `None` if it didn't overrun.
pub fn overrun_seconds(elapsed: std::time::Duration, period: std::time::Duration) -> Option<f64> {
    elapsed
        .checked_sub(period)
        .filter(|d| d.as_nanos() > 0)
        .map(|d| d.as_secs_f64())
}
