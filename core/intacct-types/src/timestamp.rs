//! Modification watermarks and date-time conversions.
//!
//! The gateway reports `WHENMODIFIED` in a US locale format
//! (`01/26/2026 13:37:29`) and expects the same format inside query
//! filters. Everything the source emits or persists uses canonical RFC 3339
//! UTC with second precision (`2026-01-26T13:37:29Z`), which sorts
//! lexically in time order.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Date-time format used by the gateway in query filters and responses.
pub const QUERY_DATETIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    QUERY_DATETIME_FORMAT,
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parses any timestamp representation the source encounters.
///
/// Accepts RFC 3339 (any offset), naive ISO date-times, the gateway's
/// `MM/DD/YYYY HH:MM:SS` format and bare dates. Naive values are UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidTimestamp("empty timestamp".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&naive));
            }
        }
    }

    Err(Error::InvalidTimestamp(trimmed.to_string()))
}

/// Formats an instant for use inside a gateway query filter.
#[must_use]
pub fn format_query_datetime(value: &DateTime<Utc>) -> String {
    value.format(QUERY_DATETIME_FORMAT).to_string()
}

/// Rewrites a source timestamp into the canonical wire format.
///
/// Returns `None` when the value is not a recognizable timestamp.
#[must_use]
pub fn normalize_timestamp(value: &str) -> Option<String> {
    parse_timestamp(value).ok().map(|dt| Watermark::from(dt).to_string())
}

/// The maximum observed modification time for a stream/entity pair.
///
/// Serializes as canonical RFC 3339 text; deserializes from any format
/// accepted by [`parse_timestamp`] so state written by older runs still loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// Wraps an instant, truncating to whole seconds.
    #[must_use]
    pub fn new(value: DateTime<Utc>) -> Self {
        Self(DateTime::from_timestamp(value.timestamp(), 0).unwrap_or(value))
    }

    /// Returns the underlying instant.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parses a watermark from any supported representation.
    pub fn parse(value: &str) -> Result<Self> {
        parse_timestamp(value).map(Self::new)
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl FromStr for Watermark {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Watermark {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Watermark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
