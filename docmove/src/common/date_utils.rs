use chrono::{DateTime, Utc};
use std::time::Duration;

#[inline]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Elapsed time since `since`, or zero when `since` lies in the future.
#[inline]
pub fn elapsed_since(since: &DateTime<Utc>) -> Duration {
    (Utc::now() - *since).to_std().unwrap_or(Duration::ZERO)
}

#[inline]
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
