//! Wall-clock helpers: `HH:MM` time keys and local-day bounds in the configured timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AgendaError;

/// A minute-granularity time of day, written as `HH:MM`.
///
/// Doubles as the grouping key for doses, so parsing normalizes `9:00` to `09:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn parse(s: &str) -> Result<Self, AgendaError> {
        let trimmed = s.trim();
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(Self)
            .map_err(|_| AgendaError::InvalidTime(s.to_string()))
    }

    pub fn of(dt: &NaiveDateTime) -> Self {
        Self(NaiveTime::from_hms_opt(dt.hour(), dt.minute(), 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    pub fn minutes_from_midnight(&self) -> i64 {
        i64::from(self.0.hour()) * 60 + i64::from(self.0.minute())
    }

    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for TimeOfDay {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = AgendaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, AgendaError> {
    name.parse::<Tz>()
        .map_err(|_| AgendaError::UnknownTimezone(name.to_string()))
}

/// Resolve a local wall-clock instant. DST gaps fall forward to the first valid instant.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// First instant of a local day, in UTC.
pub fn local_day_start(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    localize(tz, date.and_time(NaiveTime::MIN)).with_timezone(&Utc)
}

/// Inclusive bounds of a local day, in UTC.
pub fn local_day_bounds(tz: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_day_start(tz, date);
    let end = local_day_start(tz, date + Duration::days(1)) - Duration::seconds(1);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_normalizes_key() {
        let t = TimeOfDay::parse("9:05").unwrap();
        assert_eq!(t.to_string(), "09:05");
        assert_eq!(t.minutes_from_midnight(), 9 * 60 + 5);
    }

    #[test]
    fn test_time_of_day_rejects_garbage() {
        assert!(TimeOfDay::parse("25:00").is_err());
        assert!(TimeOfDay::parse("nine").is_err());
        assert!(matches!(
            TimeOfDay::parse("12:61"),
            Err(AgendaError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_time_of_day_serde_as_string() {
        let t = TimeOfDay::new(23, 55).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"23:55\"");
        let back: TimeOfDay = serde_json::from_str("\"23:55\"").unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<TimeOfDay>("\"later\"").is_err());
    }

    #[test]
    fn test_local_day_bounds() {
        let tz = parse_timezone("America/Argentina/Buenos_Aires").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (start, end) = local_day_bounds(tz, date);
        // Buenos Aires is UTC-3 year round.
        assert_eq!(start.to_rfc3339(), "2024-01-01T03:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-02T02:59:59+00:00");
    }

    #[test]
    fn test_unknown_timezone() {
        assert!(matches!(
            parse_timezone("Mars/Olympus_Mons"),
            Err(AgendaError::UnknownTimezone(_))
        ));
    }
}
