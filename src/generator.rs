//! Synthetic time-sheet generator
//!
//! Writes schema-conformant documents of arbitrary size for load testing.
//! Every generated file starts with a fixed control record so a query over
//! it has at least one known answer; the remaining records are random.
//!
//! Random records clock in during the first week of January 2000 and clock
//! out at most twelve hours later. Pass a seeded [`StdRng`](rand::rngs::StdRng)
//! to get the same file twice.

use crate::models::TIMESTAMP_FORMAT;
use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use quick_xml::escape::escape;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const INITIALS: &[char] = &[
    'a', 'b', 'd', 'e', 'f', 'g', 'i', 'k', 'l', 'm', 'n', 'o', 'p', 'r', 's', 't', 'v',
];

const SURNAMES: &[&str] = &[
    "alekseyev",
    "bobrova",
    "demyanenko",
    "evstigneeva",
    "fedorov",
    "germanova",
    "ivanov",
    "klimova",
    "losev",
    "maksimova",
    "nikolaev",
    "osina",
    "petrov",
    "razina",
    "stepanov",
    "tolstaya",
    "viktorov",
];

const HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<people>\n";
const FOOTER: &str = "</people>\n";

/// Longest generated shift.
const MAX_SHIFT_HOURS: i64 = 12;

/// Uniformly random instant in `[start, end]`, to the second.
pub fn random_datetime<R: Rng + ?Sized>(
    start: NaiveDateTime,
    end: NaiveDateTime,
    rng: &mut R,
) -> Result<NaiveDateTime> {
    if end < start {
        bail!("End time {} is before start time {}", end, start);
    }
    let range_seconds = (end - start).num_seconds();
    Ok(start + Duration::seconds(rng.gen_range(0..=range_seconds)))
}

/// Random `initial.surname` name.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let initial = INITIALS.choose(rng).copied().unwrap_or('a');
    let surname = SURNAMES.choose(rng).copied().unwrap_or("ivanov");
    format!("{}.{}", initial, surname)
}

/// One `<person>` element, indented for inclusion under `<people>`.
pub fn make_record(full_name: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!(
        "\t<person full_name=\"{}\">\n\t\t<start>{}</start>\n\t\t<end>{}</end>\n\t</person>\n",
        escape(full_name),
        start.format(TIMESTAMP_FORMAT),
        end.format(TIMESTAMP_FORMAT)
    )
}

/// The fixed record every generated file starts with.
pub fn control_record() -> Result<String> {
    let start = datetime(2018, 12, 31, 20, 0, 0)?;
    let end = datetime(2019, 1, 1, 6, 0, 0)?;
    Ok(make_record("h.simpson", start, end))
}

/// A random record within the generator's time frame.
pub fn random_record<R: Rng + ?Sized>(rng: &mut R) -> Result<String> {
    let frame_start = datetime(2000, 1, 1, 0, 0, 0)?;
    let frame_end = datetime(2000, 1, 8, 23, 59, 59)?;
    let start = random_datetime(frame_start, frame_end, rng)?;
    let end = random_datetime(start, start + Duration::hours(MAX_SHIFT_HOURS), rng)?;
    Ok(make_record(&random_name(rng), start, end))
}

/// Write a document with the control record followed by `num_records`
/// random ones. Returns the number of bytes written.
pub fn write_sample_file<R: Rng + ?Sized>(path: &Path, num_records: usize, rng: &mut R) -> Result<u64> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create sample file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    let mut put = |writer: &mut BufWriter<File>, chunk: &str| -> Result<()> {
        writer
            .write_all(chunk.as_bytes())
            .with_context(|| format!("Failed to write sample file: {}", path.display()))?;
        written += chunk.len() as u64;
        Ok(())
    };

    put(&mut writer, HEADER)?;
    put(&mut writer, &control_record()?)?;
    for _ in 0..num_records {
        put(&mut writer, &random_record(rng)?)?;
    }
    put(&mut writer, FOOTER)?;

    writer
        .flush()
        .with_context(|| format!("Failed to flush sample file: {}", path.display()))?;

    info!(
        path = %path.display(),
        records = num_records + 1,
        bytes = written,
        "Sample time sheet written"
    );
    Ok(written)
}

fn datetime(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, min, sec))
        .with_context(|| format!("Invalid timestamp {:02}-{:02}-{} {:02}:{:02}:{:02}", day, month, year, hour, min, sec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate_file, validate_fragment};
    use crate::timestamp_parser::TimestampParser;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn at(value: &str) -> NaiveDateTime {
        TimestampParser::parse(value).unwrap()
    }

    #[test]
    fn test_random_datetime_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let start = at("01-01-2000 00:00:00");
        let end = at("01-01-2000 00:00:10");
        for _ in 0..100 {
            let value = random_datetime(start, end, &mut rng).unwrap();
            assert!(start <= value && value <= end);
        }
        assert_eq!(random_datetime(start, start, &mut rng).unwrap(), start);
    }

    #[test]
    fn test_random_datetime_rejects_inverted_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let result = random_datetime(at("02-01-2000 00:00:00"), at("01-01-2000 00:00:00"), &mut rng);
        assert!(result.is_err());
    }

    #[test]
    fn test_random_name_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let name = random_name(&mut rng);
            let (initial, surname) = name.split_once('.').unwrap();
            assert_eq!(initial.len(), 1);
            assert!(SURNAMES.contains(&surname));
        }
    }

    #[test]
    fn test_make_record_is_valid_fragment() {
        let record = make_record("o'brien & sons", at("01-01-2000 10:00:00"), at("01-01-2000 11:00:00"));
        let raw = validate_fragment(&record).unwrap();
        assert_eq!(raw.full_name, "o'brien & sons");
        assert_eq!(raw.start, "01-01-2000 10:00:00");
        assert_eq!(raw.end, "01-01-2000 11:00:00");
    }

    #[test]
    fn test_control_record() {
        let raw = validate_fragment(&control_record().unwrap()).unwrap();
        assert_eq!(raw.full_name, "h.simpson");
        assert_eq!(raw.start, "31-12-2018 20:00:00");
        assert_eq!(raw.end, "01-01-2019 06:00:00");
    }

    #[test]
    fn test_random_record_shift_is_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let raw = validate_fragment(&random_record(&mut rng).unwrap()).unwrap();
            let start = at(&raw.start);
            let end = at(&raw.end);
            assert!(start >= at("01-01-2000 00:00:00"));
            assert!(start <= at("08-01-2000 23:59:59"));
            assert!(end >= start);
            assert!(end - start <= Duration::hours(MAX_SHIFT_HOURS));
        }
    }

    #[test]
    fn test_write_sample_file_is_valid_and_reproducible() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.xml");
        let second = dir.path().join("second.xml");

        let bytes = write_sample_file(&first, 25, &mut StdRng::seed_from_u64(3)).unwrap();
        write_sample_file(&second, 25, &mut StdRng::seed_from_u64(3)).unwrap();

        let summary = validate_file(&first).unwrap();
        assert_eq!(summary.records, 26);
        assert_eq!(std::fs::metadata(&first).unwrap().len(), bytes);
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
    }
}
