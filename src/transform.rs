//! Record normalization: raw `<person>` strings to a dated, measured entry.

use crate::error::Result;
use crate::models::{Hours, NormalizedEntry, RawRecord};
use crate::timestamp_parser::TimestampParser;
use chrono::NaiveDate;
use tracing::debug;

/// Normalize one raw record.
///
/// The entry is dated by the calendar day of its clock-in, so a shift that
/// crosses midnight counts towards the day it started.
pub fn transform(record: &RawRecord) -> Result<NormalizedEntry> {
    let (date, hours) = measure(record)?;
    Ok(NormalizedEntry {
        full_name: record.full_name.clone(),
        date,
        hours,
    })
}

/// Like [`transform`], but takes ownership to avoid cloning the name.
pub fn transform_owned(record: RawRecord) -> Result<NormalizedEntry> {
    let (date, hours) = measure(&record)?;
    Ok(NormalizedEntry {
        full_name: record.full_name,
        date,
        hours,
    })
}

fn measure(record: &RawRecord) -> Result<(NaiveDate, Hours)> {
    let start = TimestampParser::parse(&record.start)?;
    let end = TimestampParser::parse(&record.end)?;
    let hours = Hours::from_seconds((end - start).num_seconds());

    if hours.is_negative() {
        debug!(
            full_name = %record.full_name,
            start = %record.start,
            end = %record.end,
            "Clock-out precedes clock-in, keeping negative duration"
        );
    }

    Ok((start.date(), hours))
}

/// Hours between two timestamps, rounded to two decimals.
pub fn hours_between(start: &str, end: &str) -> Result<Hours> {
    let start = TimestampParser::parse(start)?;
    let end = TimestampParser::parse(end)?;
    Ok(Hours::from_seconds((end - start).num_seconds()))
}
