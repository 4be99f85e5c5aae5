use crate::error::{Result, TimesheetError};
use crate::models::{DATE_FORMAT, TIMESTAMP_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};

const TIMESTAMP_SHAPE: &str = "DD-MM-YYYY HH:MM:SS";
const DATE_SHAPE: &str = "DD-MM-YYYY";

/// Parses the fixed-width local timestamps and dates used in time sheets.
///
/// chrono accepts unpadded fields and signed years, so each value is first
/// checked against the exact character shape before it is handed to chrono.
pub struct TimestampParser;

impl TimestampParser {
    /// Parse a `DD-MM-YYYY HH:MM:SS` timestamp.
    pub fn parse(value: &str) -> Result<NaiveDateTime> {
        if !matches_shape(value, TIMESTAMP_SHAPE) {
            return Err(parse_error(value, TIMESTAMP_SHAPE));
        }
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .map_err(|_| parse_error(value, TIMESTAMP_SHAPE))
    }

    /// Parse a `DD-MM-YYYY` calendar date.
    pub fn parse_date(value: &str) -> Result<NaiveDate> {
        if !matches_shape(value, DATE_SHAPE) {
            return Err(parse_error(value, DATE_SHAPE));
        }
        NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| parse_error(value, DATE_SHAPE))
    }
}

fn parse_error(value: &str, expected: &'static str) -> TimesheetError {
    TimesheetError::Parse {
        value: value.to_string(),
        expected,
    }
}

/// Letters in `shape` stand for one ASCII digit; anything else must match literally.
fn matches_shape(value: &str, shape: &str) -> bool {
    value.len() == shape.len()
        && value.bytes().zip(shape.bytes()).all(|(v, s)| {
            if s.is_ascii_alphabetic() {
                v.is_ascii_digit()
            } else {
                v == s
            }
        })
}
