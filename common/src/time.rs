//! Time utilities for rate timestamps and calendar days.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;

/// Format used by remote sources for calendar days.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Get the current calendar day (UTC).
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Error returned when a calendar-day string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid calendar day {input:?}: expected YYYY-MM-DD")]
pub struct DayParseError {
    pub input: String,
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_day(input: &str) -> Result<NaiveDate, DayParseError> {
    NaiveDate::parse_from_str(input.trim(), DAY_FORMAT).map_err(|_| DayParseError {
        input: input.to_string(),
    })
}

/// Format a calendar day as `YYYY-MM-DD`.
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// First day of a window of `days` days ending at `end` (inclusive).
///
/// Windows reaching past the earliest representable day start there.
pub fn window_start(end: NaiveDate, days: u32) -> NaiveDate {
    end.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}
