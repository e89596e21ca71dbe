//! General time utility functions

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Current UNIX time in seconds.
pub fn unix_now_s() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Clamp a measured time step into `(0, max]`, substituting `nominal` for anything outside it.
pub fn clamp_dt(dt: Duration, max: Duration, nominal: Duration) -> Duration {
    if dt.is_zero() || dt > max {
        nominal
    } else {
        dt
    }
}
