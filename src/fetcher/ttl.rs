//! Human-readable TTLs such as `"10h"` or `"1d"`.

use chrono::Duration;

use super::error::{FetchError, Result};

/// TTL used when a fetcher is given none.
pub fn default_ttl() -> Duration {
    Duration::days(1)
}

/// Parse `<digits><unit>` into a duration.
///
/// Units are `ms`, `s`, `m`, `h`, `d`, `w`, `M` (30 days) and `y` (365 days),
/// plus their spelled-out singular and plural names. A missing or
/// unrecognized unit fails, whatever the number.
pub fn parse_duration(ttl: &str) -> Option<Duration> {
    let digits_end = ttl.find(|c: char| !c.is_ascii_digit()).unwrap_or(ttl.len());
    if digits_end == 0 {
        return None;
    }
    let n: i64 = ttl[..digits_end].parse().ok()?;

    let unit_ms: i64 = match &ttl[digits_end..] {
        "ms" | "millisecond" | "milliseconds" => 1,
        "s" | "second" | "seconds" => 1_000,
        "m" | "minute" | "minutes" => 60 * 1_000,
        "h" | "hour" | "hours" => 60 * 60 * 1_000,
        "d" | "day" | "days" => 24 * 60 * 60 * 1_000,
        "w" | "week" | "weeks" => 7 * 24 * 60 * 60 * 1_000,
        "M" | "month" | "months" => 30 * 24 * 60 * 60 * 1_000,
        "y" | "year" | "years" => 365 * 24 * 60 * 60 * 1_000,
        _ => return None,
    };

    Duration::try_milliseconds(n.checked_mul(unit_ms)?)
}

/// A TTL as handed to a fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ttl {
    Duration(Duration),
    /// Unparsed; resolving an unrecognized string is an error.
    Spec(String),
}

impl Ttl {
    pub fn resolve(&self) -> Result<Duration> {
        match self {
            Ttl::Duration(d) => Ok(*d),
            Ttl::Spec(s) => parse_duration(s).ok_or_else(|| FetchError::InvalidTtl(s.clone())),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::Duration(d)
    }
}

impl From<&str> for Ttl {
    fn from(s: &str) -> Self {
        Ttl::Spec(s.to_string())
    }
}

impl From<String> for Ttl {
    fn from(s: String) -> Self {
        Ttl::Spec(s)
    }
}
