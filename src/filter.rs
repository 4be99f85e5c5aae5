//! Date-range filtering
//!
//! A [`DateWindow`] is an inclusive pair of calendar dates. Bounds are parsed
//! and checked once, before any batch is read; filtering itself only compares
//! the already-derived `date` of each entry.

use crate::error::{Result, TimesheetError};
use crate::models::{NormalizedEntry, DATE_FORMAT};
use crate::timestamp_parser::TimestampParser;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for DateWindow {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl DateWindow {
    /// Window covering every representable date.
    pub fn unbounded() -> Self {
        Self {
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        }
    }

    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(TimesheetError::InvalidRange(format!(
                "start date {} is after end date {}",
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a window from optional `DD-MM-YYYY` bounds; a missing bound is open.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = match start {
            Some(value) => parse_bound("start", value)?,
            None => NaiveDate::MIN,
        };
        let end = match end {
            Some(value) => parse_bound("end", value)?,
            None => NaiveDate::MAX,
        };
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start == NaiveDate::MIN && self.end == NaiveDate::MAX
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |date: NaiveDate, open: NaiveDate| {
            if date == open {
                "*".to_string()
            } else {
                date.format(DATE_FORMAT).to_string()
            }
        };
        write!(
            f,
            "{}..={}",
            bound(self.start, NaiveDate::MIN),
            bound(self.end, NaiveDate::MAX)
        )
    }
}

fn parse_bound(which: &str, value: &str) -> Result<NaiveDate> {
    TimestampParser::parse_date(value).map_err(|_| {
        TimesheetError::InvalidRange(format!(
            "{} date {:?} is not a valid date in DD-MM-YYYY format",
            which, value
        ))
    })
}

/// Keep the entries dated inside `window`, preserving their order.
pub fn filter_entries(mut entries: Vec<NormalizedEntry>, window: &DateWindow) -> Vec<NormalizedEntry> {
    if !window.is_unbounded() {
        entries.retain(|entry| window.contains(entry.date));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Hours;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(name: &str, day: NaiveDate) -> NormalizedEntry {
        NormalizedEntry {
            full_name: name.to_string(),
            date: day,
            hours: Hours::from_hundredths(100),
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let window = DateWindow::parse(Some("02-01-2000"), Some("02-01-2000")).unwrap();
        assert!(window.contains(date(2, 1, 2000)));
        assert!(!window.contains(date(1, 1, 2000)));
        assert!(!window.contains(date(3, 1, 2000)));
    }

    #[test]
    fn test_open_bounds() {
        let window = DateWindow::parse(Some("03-01-2020"), None).unwrap();
        assert!(window.contains(date(31, 12, 2199)));
        assert!(!window.contains(date(2, 1, 2020)));

        let window = DateWindow::parse(None, Some("02-01-2020")).unwrap();
        assert!(window.contains(date(1, 1, 1970)));
        assert!(!window.contains(date(3, 1, 2020)));

        assert!(DateWindow::parse(None, None).unwrap().is_unbounded());
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let err = DateWindow::parse(Some("05-01-2020"), Some("04-01-2020")).unwrap_err();
        assert!(matches!(err, TimesheetError::InvalidRange(_)));
    }

    #[test]
    fn test_malformed_bound_is_invalid_range() {
        let err = DateWindow::parse(Some("2020-01-05"), None).unwrap_err();
        assert!(matches!(err, TimesheetError::InvalidRange(_)));
        let err = DateWindow::parse(None, Some("31-02-2020")).unwrap_err();
        assert!(matches!(err, TimesheetError::InvalidRange(_)));
    }

    #[test]
    fn test_filter_preserves_order() {
        let entries = vec![
            entry("a", date(2, 1, 2000)),
            entry("b", date(12, 9, 2000)),
            entry("c", date(30, 7, 2009)),
            entry("d", date(2, 1, 2000)),
        ];
        let window = DateWindow::parse(Some("02-01-2000"), Some("02-01-2000")).unwrap();
        let kept: Vec<String> = filter_entries(entries, &window)
            .into_iter()
            .map(|e| e.full_name)
            .collect();
        assert_eq!(kept, vec!["a", "d"]);
    }

    #[test]
    fn test_compares_dates_not_strings() {
        // "12-09-1999" > "02-01-2000" lexicographically
        let window = DateWindow::parse(Some("12-09-1999"), Some("02-01-2000")).unwrap();
        assert!(window.contains(date(31, 12, 1999)));
    }

    #[test]
    fn test_display() {
        let window = DateWindow::parse(Some("03-01-2020"), None).unwrap();
        assert_eq!(window.to_string(), "03-01-2020..=*");
    }
}
