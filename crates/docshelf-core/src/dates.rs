//! Tolerant decoding of server timestamps.
//!
//! The server emits ISO-8601 with and without fractional seconds, with
//! and without a timezone offset, and bare dates. Timestamps without an
//! offset are treated as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;

/// A timestamp string matched none of the accepted formats.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unable to decode date from string: {0}")]
pub struct DateParseError(pub String);

/// Parse a server timestamp in any of the accepted formats.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DateParseError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    // No offset: fractional seconds are optional in %.f.
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(DateParseError(value.to_string()))
}

/// serde adapter for response models, `#[serde(with = "docshelf_core::dates")]`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = <String as serde::Deserialize>::deserialize(deserializer)?;
    parse_timestamp(&value).map_err(serde::de::Error::custom)
}

/// serde adapter counterpart; always emits RFC3339.
pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.to_rfc3339())
}
