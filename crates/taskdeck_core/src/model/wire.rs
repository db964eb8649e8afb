//! JSON field codecs for calendar values.
//!
//! Stored documents written by older clients use `""` for "no date", and the
//! time picker emits `HH:MM`. Both shapes are accepted on read; writes use
//! `null` and the shortest lossless time format.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serializer};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_due_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

/// Parses a `HH:MM` (or `HH:MM:SS`) time of day.
pub fn parse_due_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S%.f"))
        .ok()
}

pub(crate) fn format_time(time: NaiveTime) -> String {
    if time.second() == 0 && time.nanosecond() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S%.f").to_string()
    }
}

pub(crate) mod opt_date {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => s.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)?.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_due_date(text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid due date `{text}`"))),
        }
    }
}

pub(crate) mod opt_time {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => s.serialize_str(&format_time(*time)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(d)?.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_due_time(text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid due time `{text}`"))),
        }
    }
}
