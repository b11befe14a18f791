//! Timestamp handling.
//!
//! All instants are stored as UTC with a fixed-width layout
//! (`2024-05-01T09:30:00.000Z`) so that string comparison orders them
//! chronologically. Range queries in the storage layer rely on this.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const STORAGE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

const DATE_ONLY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const LOCAL_MINUTES: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

const LOCAL_SECONDS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

const LOCAL_FRACTION: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime.to_offset(UtcOffset::UTC))
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Formats in the fixed-width storage layout.
    pub fn to_storage_string(&self) -> String {
        format_storage(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_string())
    }
}

impl FromStr for Timestamp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        parse_iso8601(s).map(Timestamp::new)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_storage_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timestamp::from_str(&s).map_err(serde::de::Error::custom)
    }
}

pub fn now_utc() -> Timestamp {
    Timestamp(OffsetDateTime::now_utc())
}

/// Formats an instant as UTC in the fixed-width storage layout.
pub fn format_storage(datetime: OffsetDateTime) -> String {
    let utc = datetime.to_offset(UtcOffset::UTC);
    // The layout only contains numeric components; formatting cannot fail
    // for years 0..=9999.
    utc.format(STORAGE_FORMAT)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Parses the ISO 8601 shapes clients send: full RFC 3339, a bare date, or a
/// local date-time without offset (interpreted as UTC).
pub fn parse_iso8601(input: &str) -> Result<OffsetDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return Err(CoreError::invalid_date_time("empty value"));
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(dt.to_offset(UtcOffset::UTC));
    }
    if let Ok(date) = Date::parse(s, DATE_ONLY) {
        return Ok(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc());
    }
    for layout in [LOCAL_FRACTION, LOCAL_SECONDS, LOCAL_MINUTES] {
        if let Ok(dt) = PrimitiveDateTime::parse(s, layout) {
            return Ok(dt.assume_utc());
        }
    }
    Err(CoreError::invalid_date_time(format!(
        "'{input}' is not an ISO 8601 date"
    )))
}

/// Returns `[start, end)` of the UTC calendar day containing `instant`.
pub fn utc_day_bounds(instant: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let start = PrimitiveDateTime::new(instant.to_offset(UtcOffset::UTC).date(), Time::MIDNIGHT)
        .assume_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn storage_format_is_fixed_width_and_sortable() {
        let a = format_storage(datetime!(2024-05-01 09:30:00 UTC));
        let b = format_storage(datetime!(2024-05-01 09:30:00.5 UTC));
        assert_eq!(a, "2024-05-01T09:30:00.000Z");
        assert_eq!(b, "2024-05-01T09:30:00.500Z");
        assert!(a < b);
    }

    #[test]
    fn parses_common_iso8601_shapes() {
        let expected = datetime!(2024-05-01 00:00:00 UTC);
        assert_eq!(parse_iso8601("2024-05-01").unwrap(), expected);
        assert_eq!(parse_iso8601("2024-05-01T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_iso8601("2024-05-01T02:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_iso8601("2024-05-01T00:00").unwrap(), expected);
        assert_eq!(parse_iso8601("2024-05-01T00:00:00.000").unwrap(), expected);
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_iso8601("").is_err());
        assert!(parse_iso8601("tomorrow").is_err());
        assert!(parse_iso8601("2024-13-01").is_err());
    }

    #[test]
    fn day_bounds_cover_one_utc_day() {
        let (start, end) = utc_day_bounds(datetime!(2024-05-01 23:59:59 +03:00));
        assert_eq!(start, datetime!(2024-05-01 00:00:00 UTC));
        assert_eq!(end, datetime!(2024-05-02 00:00:00 UTC));
    }

    #[test]
    fn timestamp_serde_uses_storage_layout() {
        let ts = Timestamp::new(datetime!(2024-05-01 10:00:00 +02:00));
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-05-01T08:00:00.000Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }
}
