//! Timestamp rendering: strftime patterns or a compact relative age.

use std::fmt;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use super::FormatError;

/// How timestamps are displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatetimeFormat {
    /// Age relative to now, e.g. `5m` or `3d`.
    Relative,
    /// A validated strftime pattern.
    Pattern(String),
}

impl Default for DatetimeFormat {
    fn default() -> Self {
        DatetimeFormat::Pattern("%Y-%m-%d %H:%M:%S".to_string())
    }
}

impl FromStr for DatetimeFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "relative" {
            return Ok(DatetimeFormat::Relative);
        }
        if s.is_empty() || StrftimeItems::new(s).any(|item| matches!(item, Item::Error)) {
            return Err(FormatError::InvalidDatetimeFormat(s.to_string()));
        }
        Ok(DatetimeFormat::Pattern(s.to_string()))
    }
}

impl fmt::Display for DatetimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatetimeFormat::Relative => f.write_str("relative"),
            DatetimeFormat::Pattern(p) => f.write_str(p),
        }
    }
}

pub fn render_datetime(ts: DateTime<Utc>, format: &DatetimeFormat, now: DateTime<Utc>) -> String {
    match format {
        DatetimeFormat::Relative => render_relative(ts, now),
        DatetimeFormat::Pattern(p) => ts.format(p).to_string(),
    }
}

/// Largest single unit, with the same cutoffs as the usual "time ago"
/// renderings: under 45 seconds, minutes, 22 hours, 26 days and 11 months
/// the smaller unit is used.
fn render_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - ts).num_seconds().unsigned_abs() as f64;
    let round = |n: f64| (n.round() as u64).max(1);

    if secs < 45.0 {
        return format!("{}s", secs as u64);
    }
    let minutes = secs / 60.0;
    if minutes < 44.5 {
        return format!("{}m", round(minutes));
    }
    let hours = minutes / 60.0;
    if hours < 21.5 {
        return format!("{}h", round(hours));
    }
    let days = hours / 24.0;
    if days < 25.5 {
        return format!("{}d", round(days));
    }
    let months = days / 30.4;
    if months < 10.5 {
        return format!("{}M", round(months));
    }
    format!("{}Y", round(days / 365.0))
}
