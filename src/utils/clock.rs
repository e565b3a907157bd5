//! Wall-clock helpers.

/// Current Unix time in seconds; the unit of every oplock.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
