//! Streaming batch reader
//!
//! [`BatchReader`] walks a time-sheet document once, front to back, with a
//! pull-based quick-xml event reader. Every event is decoded into one reused
//! buffer and fed to the [`SchemaValidator`]; no document tree is ever built.
//! Completed `<person>` records are collected into batches of at most
//! `batch_size` and handed out through [`Iterator`].
//!
//! ## Batch protocol
//!
//! - every full batch is emitted as soon as it fills up;
//! - at end of document exactly one final batch is emitted, which may be
//!   shorter than `batch_size` or empty;
//! - after the final batch, or after an error, the iterator is exhausted.
//!
//! Only the batch under construction is held by the reader, so memory stays
//! proportional to `batch_size` whatever the file size. [`ReaderStats`] and
//! the reader's [`MemoryTracker`] record what was held at the peak.
//!
//! Dropping the reader at any batch boundary closes the file.

use crate::error::{Result, TimesheetError};
use crate::memory::{MemoryPressureLevel, MemoryTracker, DEFAULT_WARNING_THRESHOLD_PCT};
use crate::models::RawRecord;
use crate::schema::SchemaValidator;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Upper bound on up-front batch allocation; larger batches grow on demand.
const MAX_PREALLOCATED_RECORDS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Records per batch. Zero is treated as one.
    pub batch_size: usize,
    /// Capacity of the buffered file reader in bytes.
    pub buffer_capacity: usize,
    /// Limit for memory pressure reporting in bytes; zero disables it.
    pub memory_limit_bytes: usize,
    /// Share of the limit, in percent, at which a batch counts as pressured.
    pub memory_warning_pct: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            memory_limit_bytes: 512 * 1_000_000,
            memory_warning_pct: DEFAULT_WARNING_THRESHOLD_PCT,
        }
    }
}

impl ReaderOptions {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub records_read: u64,
    pub batches_emitted: u64,
    pub peak_batch_len: usize,
    pub peak_buffered_bytes: usize,
    /// Highest pressure level reached while a batch was being filled
    pub peak_pressure: MemoryPressureLevel,
    /// Batches that reached the warning threshold
    pub pressured_batches: u64,
}

pub struct BatchReader<R: BufRead> {
    xml: Reader<R>,
    validator: SchemaValidator,
    buf: Vec<u8>,
    batch_size: usize,
    memory: MemoryTracker,
    origin: PathBuf,
    stats: ReaderStats,
    last_batch_pressure: MemoryPressureLevel,
    last_batch_pressured: bool,
    exhausted: bool,
}

/// Open `path` and stream it in batches of `batch_size` records.
pub fn read_batches(path: &Path, batch_size: usize) -> Result<BatchReader<BufReader<File>>> {
    read_batches_with(path, &ReaderOptions::with_batch_size(batch_size))
}

pub fn read_batches_with(
    path: &Path,
    options: &ReaderOptions,
) -> Result<BatchReader<BufReader<File>>> {
    let file = File::open(path).map_err(|source| TimesheetError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let capacity = options.buffer_capacity.max(1024);
    BatchReader::from_reader(BufReader::with_capacity(capacity, file), path, options)
}

impl<R: BufRead> BatchReader<R> {
    /// Wrap any buffered source. The prolog is read immediately, so a missing
    /// or wrong root element fails here rather than on the first batch.
    pub fn from_reader(source: R, origin: impl Into<PathBuf>, options: &ReaderOptions) -> Result<Self> {
        let batch_size = options.batch_size.max(1);
        if options.batch_size == 0 {
            debug!("Batch size 0 requested, using 1");
        }

        let mut reader = Self {
            xml: Reader::from_reader(source),
            validator: SchemaValidator::new(),
            buf: Vec::new(),
            batch_size,
            memory: MemoryTracker::new(options.memory_limit_bytes)
                .with_warning_threshold(options.memory_warning_pct),
            origin: origin.into(),
            stats: ReaderStats::default(),
            last_batch_pressure: MemoryPressureLevel::Low,
            last_batch_pressured: false,
            exhausted: false,
        };
        reader.read_prolog()?;

        debug!(
            source = %reader.origin.display(),
            batch_size = batch_size,
            "Opened time sheet for streaming"
        );
        Ok(reader)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn memory(&self) -> &MemoryTracker {
        &self.memory
    }

    /// Pressure level at the end of the most recent batch, before its
    /// records were handed over.
    pub fn last_batch_pressure(&self) -> MemoryPressureLevel {
        self.last_batch_pressure
    }

    /// Whether the most recent batch reached the warning threshold.
    pub fn last_batch_under_pressure(&self) -> bool {
        self.last_batch_pressured
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    fn read_prolog(&mut self) -> Result<()> {
        // the validator cannot emit records before the root opens
        while !self.validator.root_seen() && !self.exhausted {
            self.step()?;
        }
        Ok(())
    }

    /// Read and validate one event.
    fn step(&mut self) -> Result<Option<RawRecord>> {
        self.buf.clear();
        let event = match self.xml.read_event_into(&mut self.buf) {
            Ok(event) => event,
            Err(err) => {
                let position = self.xml.buffer_position() as u64;
                return Err(TimesheetError::from_xml(err, position, &self.origin));
            }
        };
        let position = self.xml.buffer_position() as u64;
        if let Event::Eof = event {
            self.exhausted = true;
        }
        self.validator.feed(&event, position)
    }

    fn fill_batch(&mut self) -> Result<Vec<RawRecord>> {
        let mut batch = Vec::with_capacity(self.batch_size.min(MAX_PREALLOCATED_RECORDS));
        let mut batch_bytes = 0usize;

        while batch.len() < self.batch_size && !self.exhausted {
            if let Some(record) = self.step()? {
                let size = record.approx_size();
                self.memory.track_allocation(size);
                batch_bytes += size;
                batch.push(record);
            }
        }

        self.stats.records_read += batch.len() as u64;
        self.stats.batches_emitted += 1;
        self.stats.peak_batch_len = self.stats.peak_batch_len.max(batch.len());
        self.stats.peak_buffered_bytes = self.stats.peak_buffered_bytes.max(batch_bytes);

        // usage peaks here, while the whole batch is still charged
        self.last_batch_pressure = self.memory.pressure_level();
        self.last_batch_pressured = self.memory.under_pressure();
        self.stats.peak_pressure = self.stats.peak_pressure.max(self.last_batch_pressure);
        if self.last_batch_pressured {
            self.stats.pressured_batches += 1;
        }

        // ownership passes to the caller
        self.memory.track_deallocation(batch_bytes);

        trace!(
            batch = self.stats.batches_emitted,
            records = batch.len(),
            bytes = batch_bytes,
            final_batch = self.exhausted,
            "Batch filled"
        );
        Ok(batch)
    }
}

impl<R: BufRead> Iterator for BatchReader<R> {
    type Item = Result<Vec<RawRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.fill_batch() {
            Ok(batch) => Some(Ok(batch)),
            Err(err) => {
                self.exhausted = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(records: usize) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<people>\n");
        for i in 0..records {
            xml.push_str(&format!(
                "  <person full_name=\"p{}\">\n    <start>01-01-2020 10:00:00</start>\n    <end>01-01-2020 11:00:00</end>\n  </person>\n",
                i
            ));
        }
        xml.push_str("</people>\n");
        xml
    }

    fn batches(xml: &str, batch_size: usize) -> Vec<Vec<RawRecord>> {
        let reader = BatchReader::from_reader(
            xml.as_bytes(),
            "<memory>",
            &ReaderOptions::with_batch_size(batch_size),
        )
        .unwrap();
        reader.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_partial_final_batch() {
        let sizes: Vec<usize> = batches(&document(7), 3).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_exact_multiple_ends_with_empty_batch() {
        let sizes: Vec<usize> = batches(&document(6), 3).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 0]);
    }

    #[test]
    fn test_empty_document_yields_one_empty_batch() {
        let sizes: Vec<usize> = batches("<people></people>", 10).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![0]);
        let sizes: Vec<usize> = batches("<people/>", 10).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![0]);
    }

    #[test]
    fn test_records_keep_document_order() {
        let names: Vec<String> = batches(&document(5), 2)
            .into_iter()
            .flatten()
            .map(|r| r.full_name)
            .collect();
        assert_eq!(names, vec!["p0", "p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let xml = document(2);
        let reader =
            BatchReader::from_reader(xml.as_bytes(), "<memory>", &ReaderOptions::with_batch_size(0))
                .unwrap();
        assert_eq!(reader.batch_size(), 1);
    }

    #[test]
    fn test_wrong_root_fails_at_open() {
        let result = BatchReader::from_reader(
            "<staff><person/></staff>".as_bytes(),
            "<memory>",
            &ReaderOptions::default(),
        );
        assert!(matches!(result, Err(TimesheetError::Schema { .. })));
    }

    #[test]
    fn test_error_fuses_iterator() {
        let xml = "<people><person full_name=\"a\"><start>01-01-2020 10:00:00</start></person></people>";
        let mut reader =
            BatchReader::from_reader(xml.as_bytes(), "<memory>", &ReaderOptions::default()).unwrap();
        assert!(matches!(reader.next(), Some(Err(TimesheetError::Schema { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_stats_track_peak_batch() {
        let xml = document(25);
        let mut reader = BatchReader::from_reader(
            xml.as_bytes(),
            "<memory>",
            &ReaderOptions::with_batch_size(10),
        )
        .unwrap();
        let total: usize = reader.by_ref().map(|b| b.unwrap().len()).sum();
        let stats = reader.stats();
        assert_eq!(total, 25);
        assert_eq!(stats.records_read, 25);
        assert_eq!(stats.batches_emitted, 3);
        assert_eq!(stats.peak_batch_len, 10);
        assert_eq!(reader.memory().current_usage(), 0);
        assert_eq!(reader.memory().peak_usage(), stats.peak_buffered_bytes);
        assert_eq!(stats.peak_pressure, MemoryPressureLevel::Low);
        assert_eq!(stats.pressured_batches, 0);
    }

    #[test]
    fn test_tiny_limit_records_batch_pressure() {
        let xml = document(12);
        let options = ReaderOptions {
            batch_size: 5,
            memory_limit_bytes: 64,
            ..ReaderOptions::default()
        };
        let mut reader = BatchReader::from_reader(xml.as_bytes(), "<memory>", &options).unwrap();

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(reader.last_batch_pressure(), MemoryPressureLevel::Critical);
        assert!(reader.last_batch_under_pressure());
        // released on hand-over
        assert!(!reader.memory().under_pressure());

        for batch in reader.by_ref() {
            batch.unwrap();
        }
        // 5 + 5 + 2, every one of them over 64 bytes
        assert!(reader.last_batch_under_pressure());
        let stats = reader.stats();
        assert_eq!(stats.peak_pressure, MemoryPressureLevel::Critical);
        assert_eq!(stats.pressured_batches, 3);
    }
}
