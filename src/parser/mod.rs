//! Record parser - one raw CSV line to a typed [`Event`]
//!
//! Line layout: `timestamp,field1,...,fieldN`. Every field may be wrapped in
//! one layer of double quotes. The timestamp is
//! `YYYY-MM-DD HH:MM:SS[.fffffffff]` (a `T` may replace the space) and is
//! interpreted in UTC, so conversion does not depend on the host zone.
//!
//! Failures are returned as [`ParseFailure`] values. The loader counts and
//! drops them; they never travel further down the pipeline.

use std::marker::PhantomData;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::common::{Event, Payload};

/// Field separator of the source dataset
pub const FIELD_SEPARATOR: char = ',';

/// Why a line was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("empty line")]
    Empty,

    #[error("expected {expected} payload field(s), found {found}")]
    MissingPayload { expected: usize, found: usize },

    #[error("malformed timestamp {0:?}")]
    MalformedTimestamp(String),

    #[error("timestamp {0:?} is not a valid calendar date/time")]
    InvalidCalendar(String),
}

/// Calendar fields of a UTC date-time, as read from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanosecond: u32,
}

/// Convert calendar fields to epoch milliseconds (UTC)
///
/// Returns `None` for impossible dates or times (Feb 30, hour 24, second 60,
/// nanosecond >= 1e9). Sub-millisecond precision is truncated.
pub fn civil_to_epoch_millis(dt: CivilDateTime) -> Option<i64> {
    if dt.nanosecond >= 1_000_000_000 {
        return None;
    }
    let naive = NaiveDate::from_ymd_opt(dt.year, dt.month, dt.day)?.and_hms_nano_opt(
        dt.hour,
        dt.minute,
        dt.second,
        dt.nanosecond,
    )?;
    Some(naive.and_utc().timestamp_millis())
}

/// Render epoch milliseconds in the source timestamp layout
///
/// `parse_timestamp(&format_timestamp(ms)) == Ok(ms)` for any instant in
/// years 0000-9999. Instants outside chrono's range fall back to the bare
/// millisecond count.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        None => timestamp_ms.to_string(),
    }
}

/// Strip one optional leading and one optional trailing `"`
pub fn strip_quotes(field: &str) -> &str {
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}

fn fixed_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Split the textual timestamp into calendar fields without validating ranges
fn split_timestamp(text: &str) -> Option<CivilDateTime> {
    let (date, time) = text.split_once(|c| c == ' ' || c == 'T')?;

    let mut date_parts = date.split('-');
    let year = date_parts.next().filter(|y| y.len() == 4).and_then(fixed_digits)?;
    let month = date_parts.next().filter(|m| m.len() == 2).and_then(fixed_digits)?;
    let day = date_parts.next().filter(|d| d.len() == 2).and_then(fixed_digits)?;
    if date_parts.next().is_some() {
        return None;
    }

    let (hms, fraction) = match time.split_once('.') {
        Some((hms, frac)) => (hms, Some(frac)),
        None => (time, None),
    };

    let mut time_parts = hms.split(':');
    let hour = time_parts.next().filter(|h| h.len() == 2).and_then(fixed_digits)?;
    let minute = time_parts.next().filter(|m| m.len() == 2).and_then(fixed_digits)?;
    let second = time_parts.next().filter(|s| s.len() == 2).and_then(fixed_digits)?;
    if time_parts.next().is_some() {
        return None;
    }

    let nanosecond = match fraction {
        None => 0,
        Some(frac) if (1..=9).contains(&frac.len()) => {
            fixed_digits(frac)? * 10u32.pow(9 - frac.len() as u32)
        }
        Some(_) => return None,
    };

    Some(CivilDateTime {
        year: year as i32,
        month,
        day,
        hour,
        minute,
        second,
        nanosecond,
    })
}

/// Parse `YYYY-MM-DD HH:MM:SS[.f...]` (quotes allowed) to epoch milliseconds
pub fn parse_timestamp(raw: &str) -> Result<i64, ParseFailure> {
    let text = strip_quotes(raw.trim());
    let civil =
        split_timestamp(text).ok_or_else(|| ParseFailure::MalformedTimestamp(text.to_string()))?;
    civil_to_epoch_millis(civil).ok_or_else(|| ParseFailure::InvalidCalendar(text.to_string()))
}

/// True if the line looks like a column-name header rather than data
///
/// The first field (unquoted) starting with an ASCII letter marks a header,
/// e.g. `time,url` or `"timestamp","path"`.
pub fn is_header(line: &str) -> bool {
    let first = line.split(FIELD_SEPARATOR).next().unwrap_or_default();
    strip_quotes(first.trim())
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
}

/// Line parser for a dataset whose payload type is `P`
#[derive(Debug, Clone, Copy)]
pub struct RecordParser<P = String> {
    _payload: PhantomData<fn() -> P>,
}

impl<P: Payload> Default for RecordParser<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> RecordParser<P> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }

    /// Parse one line into an event
    pub fn parse(&self, line: &str) -> Result<Event<P>, ParseFailure> {
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if line.trim().is_empty() {
            return Err(ParseFailure::Empty);
        }

        let mut fields = line.split(FIELD_SEPARATOR);
        let timestamp = parse_timestamp(fields.next().unwrap_or_default())?;

        let rest: Vec<&str> = fields.map(strip_quotes).collect();
        let payload = P::from_fields(&rest).ok_or(ParseFailure::MissingPayload {
            expected: P::ARITY,
            found: rest.len(),
        })?;

        Ok(Event::new(timestamp, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: i64 = 1_704_067_201_000; // 2024-01-01 00:00:01 UTC

    #[test]
    fn test_parses_plain_record() {
        let parser = RecordParser::<String>::new();
        let ev = parser.parse("2024-01-01 00:00:01.000000,A").unwrap();
        assert_eq!(ev.timestamp_ms(), T1);
        assert_eq!(ev.payload(), "A");
    }

    #[test]
    fn test_parses_quoted_and_t_separated() {
        let parser = RecordParser::<String>::new();
        let ev = parser
            .parse("\"2024-01-01T00:00:01.250000\",\"/Archives/edgar/data/1.txt\"")
            .unwrap();
        assert_eq!(ev.timestamp_ms(), T1 + 250);
        assert_eq!(ev.payload(), "/Archives/edgar/data/1.txt");
    }

    #[test]
    fn test_fraction_is_optional_and_truncated() {
        assert_eq!(parse_timestamp("2024-01-01 00:00:01").unwrap(), T1);
        assert_eq!(parse_timestamp("2024-01-01 00:00:01.9").unwrap(), T1 + 900);
        assert_eq!(parse_timestamp("2024-01-01 00:00:01.123999").unwrap(), T1 + 123);
        assert_eq!(
            parse_timestamp("2024-01-01 00:00:01.123456789").unwrap(),
            T1 + 123
        );
    }

    #[test]
    fn test_epoch_and_pre_epoch() {
        assert_eq!(parse_timestamp("1970-01-01 00:00:00").unwrap(), 0);
        assert_eq!(parse_timestamp("1969-12-31 23:59:59").unwrap(), -1000);
    }

    #[test]
    fn test_leap_day_handling() {
        assert!(parse_timestamp("2024-02-29 12:00:00").is_ok());
        assert!(matches!(
            parse_timestamp("2023-02-29 12:00:00"),
            Err(ParseFailure::InvalidCalendar(_))
        ));
    }

    #[test]
    fn test_rejects_impossible_components() {
        for bad in [
            "2024-13-01 00:00:00",
            "2024-01-32 00:00:00",
            "2024-01-01 24:00:00",
            "2024-01-01 00:60:00",
            "2024-01-01 00:00:60",
        ] {
            assert!(
                matches!(parse_timestamp(bad), Err(ParseFailure::InvalidCalendar(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_text() {
        for bad in [
            "bad-timestamp",
            "2024-01-01",
            "2024-1-01 00:00:00",
            "2024-01-01 00:00",
            "2024-01-01 00:00:0x",
            "2024-01-01 00:00:01.",
            "2024-01-01 00:00:01.1234567890",
            "+024-01-01 00:00:01",
            "",
        ] {
            assert!(
                matches!(parse_timestamp(bad), Err(ParseFailure::MalformedTimestamp(_))),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_missing_payload() {
        let parser = RecordParser::<String>::new();
        assert_eq!(
            parser.parse("2024-01-01 00:00:01").unwrap_err(),
            ParseFailure::MissingPayload {
                expected: 1,
                found: 0
            }
        );

        let parser = RecordParser::<[String; 3]>::new();
        assert!(matches!(
            parser.parse("2024-01-01 00:00:01,a,b"),
            Err(ParseFailure::MissingPayload {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn test_empty_line_rejected() {
        let parser = RecordParser::<String>::new();
        assert_eq!(parser.parse("").unwrap_err(), ParseFailure::Empty);
        assert_eq!(parser.parse("  \r\n").unwrap_err(), ParseFailure::Empty);
    }

    #[test]
    fn test_strips_crlf() {
        let parser = RecordParser::<String>::new();
        let ev = parser.parse("2024-01-01 00:00:01,A\r\n").unwrap();
        assert_eq!(ev.payload(), "A");
    }

    #[test]
    fn test_header_detection() {
        assert!(is_header("time,url"));
        assert!(is_header("\"timestamp\",\"path\""));
        assert!(!is_header("2024-01-01 00:00:01,A"));
        assert!(!is_header("\"2024-01-01 00:00:01\",A"));
        assert!(!is_header(""));
    }

    #[test]
    fn test_strip_quotes_one_layer() {
        assert_eq!(strip_quotes("\"a\""), "a");
        assert_eq!(strip_quotes("\"\"a\"\""), "\"a\"");
        assert_eq!(strip_quotes("\"a"), "a");
        assert_eq!(strip_quotes("a"), "a");
    }

    #[test]
    fn test_format_is_inverse_of_parse() {
        assert_eq!(format_timestamp(T1 + 250), "2024-01-01 00:00:01.250000");
        assert_eq!(format_timestamp(-1000), "1969-12-31 23:59:59.000000");
        for ms in [0, T1, T1 + 999, -1, 253_402_300_799_999] {
            assert_eq!(parse_timestamp(&format_timestamp(ms)).unwrap(), ms);
        }
    }

    #[test]
    fn test_civil_conversion_direct() {
        let dt = CivilDateTime {
            year: 2024,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 1,
            nanosecond: 500_000_000,
        };
        assert_eq!(civil_to_epoch_millis(dt), Some(T1 + 500));
        assert_eq!(
            civil_to_epoch_millis(CivilDateTime {
                nanosecond: 1_000_000_000,
                ..dt
            }),
            None
        );
    }
}
