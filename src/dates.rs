//! Commit timestamp parsing.
//!
//! Git headers carry `unix_seconds ±HHMM`. Malformed or future-dated values
//! are reported as absent rather than as errors: wrong clocks are endemic in
//! the dataset and a bad date must not fail the whole commit.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// Parse a `unix_seconds` / `±HHMM` pair into a fixed-offset instant.
///
/// Returns `None` when the timestamp is not an unsigned 32-bit decimal, the
/// zone is malformed, or the instant lies strictly in the future.
pub fn parse_timestamp(timestamp: &[u8], tz: &[u8]) -> Option<DateTime<FixedOffset>> {
    let seconds: u32 = std::str::from_utf8(timestamp).ok()?.parse().ok()?;
    let offset = parse_tz(tz)?;
    let instant = offset.timestamp_opt(i64::from(seconds), 0).single()?;
    if instant.with_timezone(&Utc) > Utc::now() {
        return None;
    }
    Some(instant)
}

/// `±HHMM` → fixed offset. Sign comes from the leading byte; hours and
/// minutes from the last four digits.
fn parse_tz(tz: &[u8]) -> Option<FixedOffset> {
    if tz.len() < 4 {
        return None;
    }
    let sign = match tz.first() {
        Some(b'-') => -1,
        _ => 1,
    };
    let s = std::str::from_utf8(tz).ok()?;
    let hours: i32 = s[s.len() - 4..s.len() - 2].parse().ok()?;
    let minutes: i32 = s[s.len() - 2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
