//! Timestamp value object for temporal data.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC timestamp for trades, tranches and domain events.
///
/// Always obtained from a clock port in application code so tests can
/// move time deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from a DateTime<Utc>.
    #[must_use]
    pub const fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Wall-clock now.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse from an ISO 8601 string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid ISO 8601 timestamp.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(dt.with_timezone(&Utc)))
    }

    /// Get the inner DateTime<Utc>.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Format as ISO 8601 / RFC 3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Duration elapsed from `earlier` to `self` (negative if `earlier` is later).
    #[must_use]
    pub fn duration_since(&self, earlier: Self) -> Duration {
        self.0 - earlier.0
    }

    /// Shift forward by `delta`.
    #[must_use]
    pub fn plus(&self, delta: Duration) -> Self {
        Self(self.0 + delta)
    }

    /// Shift backward by `delta`.
    #[must_use]
    pub fn minus(&self, delta: Duration) -> Self {
        Self(self.0 - delta)
    }

    /// Midnight UTC of the same calendar day.
    #[must_use]
    pub fn start_of_day(&self) -> Self {
        Self(self.0.date_naive().and_time(NaiveTime::MIN).and_utc())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parse_and_display() {
        let ts = Timestamp::parse("2026-01-19T12:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-19T12:00:00+00:00");
        assert_eq!(format!("{ts}"), "2026-01-19T12:00:00+00:00");
    }

    #[test]
    fn timestamp_parse_invalid() {
        assert!(Timestamp::parse("not-a-date").is_err());
    }

    #[test]
    fn timestamp_shifts_and_duration() {
        let ts = Timestamp::parse("2026-01-19T12:00:00Z").unwrap();
        let later = ts.plus(Duration::minutes(16));
        assert_eq!(later.duration_since(ts), Duration::minutes(16));
        assert_eq!(later.minus(Duration::minutes(16)), ts);
    }

    #[test]
    fn timestamp_start_of_day() {
        let ts = Timestamp::parse("2026-01-19T17:45:12Z").unwrap();
        assert_eq!(
            ts.start_of_day(),
            Timestamp::parse("2026-01-19T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn timestamp_ordering() {
        let a = Timestamp::parse("2026-01-19T12:00:00Z").unwrap();
        let b = Timestamp::parse("2026-01-19T12:00:01Z").unwrap();
        assert!(a < b);
    }
}
