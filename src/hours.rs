//! Hour arithmetic for planning the day.

use chrono::{NaiveTime, TimeDelta};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HoursError {
    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Target hours must be between 0 and 24 (got {0})")]
    InvalidTarget(String),
}

/// Parse a 24h `HH:MM` time
pub fn parse_hhmm(input: &str) -> Result<NaiveTime, HoursError> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map_err(|_| HoursError::InvalidTime(input.to_string()))
}

/// Time from `start` to `end`, wrapping past midnight when `end` is earlier
pub fn span_between(start: NaiveTime, end: NaiveTime) -> TimeDelta {
    let span = end - start;
    if span < TimeDelta::zero() {
        span + TimeDelta::days(1)
    } else {
        span
    }
}

/// How much of a `target_hours` workday begun at `start` is left at `now`
pub fn remaining_in_workday(
    start: NaiveTime,
    target_hours: f64,
    now: NaiveTime,
) -> Result<TimeDelta, HoursError> {
    if !(0.0..=24.0).contains(&target_hours) {
        return Err(HoursError::InvalidTarget(target_hours.to_string()));
    }
    let target = TimeDelta::minutes((target_hours * 60.0).round() as i64);
    let worked = span_between(start, now);
    Ok((target - worked).max(TimeDelta::zero()))
}

/// Render as `7h 05m`
pub fn format_span(span: TimeDelta) -> String {
    let minutes = span.num_minutes();
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}
