//! Time and timestamp helpers.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// UTC timestamp used for audit fields, run statistics and event times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Script delays are authored in milliseconds.
#[must_use]
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Apply a signed jitter to a millisecond delay, clamping at `floor`.
#[must_use]
pub fn jittered_millis(base: u64, jitter: i64, floor: u64) -> Duration {
    let base = i64::try_from(base).unwrap_or(i64::MAX);
    let value = base.saturating_add(jitter);
    let value = u64::try_from(value).unwrap_or(0).max(floor);
    millis(value)
}
