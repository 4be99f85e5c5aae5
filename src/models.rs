//! Core Data Models
//!
//! This module defines the data structures that flow through the time-sheet
//! query pipeline, from raw XML records to the aggregated result rows.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`RawRecord`] - one `<person>` element as read from the file
//! 2. **Normalized**: [`NormalizedEntry`] - calendar date plus worked [`Hours`]
//! 3. **Grouping**: [`AggregateKey`] - date, or date and person
//! 4. **Output**: [`ResultRow`] - one row of the final table
//!
//! ## Hours
//!
//! [`Hours`] is a fixed-point decimal stored as a signed number of hundredths
//! of an hour. Adding hundredths is exact integer arithmetic, so totals do not
//! depend on the order or grouping in which entries are summed. Addition
//! saturates at the `i64` bounds, roughly 9.2e16 hours, instead of wrapping.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Format used for calendar dates everywhere in the crate.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Format used for clock-in/clock-out timestamps.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRecord {
    pub full_name: String,
    pub start: String,
    pub end: String,
}

impl RawRecord {
    pub fn new(
        full_name: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    /// Approximate heap plus inline footprint, used for memory accounting.
    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.full_name.len() + self.start.len() + self.end.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEntry {
    pub full_name: String,
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    pub hours: Hours,
}

/// Worked time in hundredths of an hour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hours(i64);

impl Hours {
    pub const ZERO: Hours = Hours(0);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Convert a whole-second duration to hours rounded to two decimals.
    ///
    /// One hundredth of an hour is 36 seconds, so the exact value is
    /// `seconds / 36` hundredths. Ties round to the even neighbour.
    pub fn from_seconds(seconds: i64) -> Self {
        let quotient = seconds.div_euclid(36);
        let remainder = seconds.rem_euclid(36);
        let rounded = match (remainder * 2).cmp(&36) {
            std::cmp::Ordering::Less => quotient,
            std::cmp::Ordering::Greater => quotient + 1,
            std::cmp::Ordering::Equal => quotient + quotient.rem_euclid(2),
        };
        Self(rounded)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let rendered = format!("{}{}.{:02}", sign, abs / 100, abs % 100);
        f.pad(&rendered)
    }
}

impl Add for Hours {
    type Output = Hours;

    fn add(self, rhs: Hours) -> Hours {
        Hours(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Hours {
    fn add_assign(&mut self, rhs: Hours) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Hours>>(iter: I) -> Hours {
        iter.fold(Hours::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Hours> for Hours {
    fn sum<I: Iterator<Item = &'a Hours>>(iter: I) -> Hours {
        iter.copied().sum()
    }
}

impl Serialize for Hours {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Grouping key of the result table. `full_name` is `None` when the table
/// aggregates across people.
///
/// The derived ordering compares the parsed calendar date first, then the
/// name, which is the row order of the result table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AggregateKey {
    pub date: NaiveDate,
    pub full_name: Option<String>,
}

impl AggregateKey {
    pub fn for_entry(entry: &NormalizedEntry, include_names: bool) -> Self {
        Self {
            date: entry.date,
            full_name: include_names.then(|| entry.full_name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub total_hours: Hours,
}

impl ResultRow {
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(DATE_FORMAT))
}
