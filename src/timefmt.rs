//! Time formatting helpers.
//!
//! Conversions between timestamps, `YYYY-MM-DD` date strings, the integer
//! `YYYYMMDD` sort key, and `hh:mm:ss.sss` elapsed-time strings.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DURATION_FORMAT: &str = "%H:%M";
const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;

/// Current timestamp.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a date as `YYYY-MM-DD`; `None` means today in local time.
pub fn to_date_string(date: Option<NaiveDate>) -> String {
    date.unwrap_or_else(|| Local::now().date_naive())
        .format(DATE_FORMAT)
        .to_string()
}

/// Turn `YYYY-MM-DD` into the integer `YYYYMMDD`.
///
/// Only separators are stripped, so anything that is not digits afterwards
/// yields `None`. The value is a sort key, not a date validator.
pub fn to_date_number(date: &str) -> Option<u32> {
    let digits: String = date.chars().filter(|ch| *ch != '-').collect();
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Format a non-negative second count as `hh:mm:ss.sss`.
///
/// Hours grow past two digits when needed. Negative or NaN input is
/// clamped to zero.
pub fn to_time_string(total_seconds: f64) -> String {
    let total_ms = (total_seconds.max(0.0) * MILLIS_PER_SECOND as f64).round() as u64;
    let hours = total_ms / MILLIS_PER_HOUR;
    let minutes = (total_ms % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
    let millis = total_ms % MILLIS_PER_MINUTE;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        hours,
        minutes,
        millis / MILLIS_PER_SECOND,
        millis % MILLIS_PER_SECOND
    )
}

/// Parse an `hh:mm:ss.sss` string back into seconds.
pub fn parse_time_string(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    let seconds = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let (whole, fraction) = seconds.split_once('.')?;

    if hours.len() < 2 || !is_digits(hours) {
        return None;
    }
    let hours: u64 = hours.parse().ok()?;
    let minutes = bounded_field(minutes, 2, 60)?;
    let whole = bounded_field(whole, 2, 60)?;
    let fraction = bounded_field(fraction, 3, 1_000)?;

    let total_ms = hours
        .checked_mul(MILLIS_PER_HOUR)?
        .checked_add(minutes * MILLIS_PER_MINUTE + whole * MILLIS_PER_SECOND + fraction)?;
    Some(total_ms as f64 / MILLIS_PER_SECOND as f64)
}

/// `YYYY-MM-DD` naming a real calendar date.
pub fn is_valid_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok()
}

/// `hh:mm` clock value as produced by a time picker.
pub fn is_valid_duration(value: &str) -> bool {
    value.len() == 5 && NaiveTime::parse_from_str(value, DURATION_FORMAT).is_ok()
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

fn bounded_field(value: &str, width: usize, limit: u64) -> Option<u64> {
    if value.len() != width || !is_digits(value) {
        return None;
    }
    let parsed: u64 = value.parse().ok()?;
    (parsed < limit).then_some(parsed)
}
