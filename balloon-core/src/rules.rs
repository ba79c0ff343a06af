//! Pure domain rules: calendar/time helpers, pair normalization, quota caps
//!
//! Everything here is stateless and side-effect free. Any place that combines
//! two user ids into a pair key must go through [`normalize_pair`] so that
//! (A, B) and (B, A) always address the same row.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Maximum match-forming actions per user per UTC day.
pub const DAILY_TOTAL_CAP: i64 = 5;

/// Maximum "pending" spends per user per UTC day (nested inside the total cap).
pub const DAILY_PENDING_CAP: i64 = 2;

/// Maximum games a user may initiate per UTC day.
pub const DAILY_GAMES_CAP: i64 = 2;

/// Lifetime of a balloon before it is eligible for expiry.
pub const BALLOON_LIFETIME_HOURS: i64 = 36;

/// Current calendar date in UTC.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Current timestamp in UTC.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Expiry timestamp for a balloon created at `created_at`.
pub fn compute_expires_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(BALLOON_LIFETIME_HOURS)
}

/// Canonical (min, max) ordering for a pair of user ids.
pub fn normalize_pair(u1: i64, u2: i64) -> (i64, i64) {
    if u1 <= u2 { (u1, u2) } else { (u2, u1) }
}
