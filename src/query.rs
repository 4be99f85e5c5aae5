//! Query orchestration
//!
//! A [`Query`] drives one pass over a time sheet: it pulls batches from the
//! [`BatchReader`], normalizes and filters each one, and folds the survivors
//! into its [`ResultTable`]. Only the current batch and the running table are
//! alive at any moment.
//!
//! Errors abort the query. A table that was partially merged before the
//! failure is dropped with the `Query`; callers never see a half-built result
//! through [`query`].

use crate::aggregate::ResultTable;
use crate::config::Config;
use crate::error::Result;
use crate::filter::{filter_entries, DateWindow};
use crate::memory::MemoryPressureLevel;
use crate::models::{NormalizedEntry, RawRecord};
use crate::reader::{read_batches_with, BatchReader, ReaderOptions, ReaderStats};
use crate::schema::validate_file;
use crate::transform::transform_owned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOptions {
    pub window: DateWindow,
    /// Group by `(date, full_name)` instead of `date`
    pub include_names: bool,
    /// Validate the whole file before reading any batch
    pub validate_first: bool,
    pub reader: ReaderOptions,
}

impl QueryOptions {
    /// Options with the window parsed from optional `DD-MM-YYYY` bounds.
    pub fn from_bounds(start: Option<&str>, end: Option<&str>, include_names: bool) -> Result<Self> {
        Ok(Self {
            window: DateWindow::parse(start, end)?,
            include_names,
            ..Self::default()
        })
    }

    /// Reader and validation settings taken from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            validate_first: config.processing.validate_before_query,
            reader: ReaderOptions {
                batch_size: config.processing.batch_size,
                buffer_capacity: config.memory.buffer_size_kb.saturating_mul(1024),
                memory_limit_bytes: config.memory_limit_bytes(),
                memory_warning_pct: config.memory.warning_threshold_pct,
            },
            ..Self::default()
        }
    }

    pub fn window(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }

    pub fn include_names(mut self, include_names: bool) -> Self {
        self.include_names = include_names;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.reader.batch_size = batch_size;
        self
    }
}

/// What one processed batch contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// 1-based batch number
    pub index: u64,
    /// Records read in the batch
    pub records: usize,
    /// Records left after date filtering
    pub kept: usize,
    /// Rows in the running table after the merge
    pub table_rows: usize,
    /// Memory pressure while the batch was buffered
    pub pressure: MemoryPressureLevel,
    /// The batch reached the configured warning threshold
    pub under_pressure: bool,
}

pub struct Query<R: BufRead = BufReader<File>> {
    reader: BatchReader<R>,
    window: DateWindow,
    table: ResultTable,
    span: Span,
    batches: u64,
}

impl Query {
    /// Open `path` for querying. With `validate_first` the file is checked in
    /// a separate pass and nothing is aggregated if it is invalid.
    pub fn open(path: &Path, options: &QueryOptions) -> Result<Self> {
        let span = query_span(path);
        let reader = {
            let _enter = span.enter();
            if options.validate_first {
                let summary = validate_file(path)?;
                debug!(records = summary.records, bytes = summary.bytes, "Validation pass finished");
            }
            read_batches_with(path, &options.reader)?
        };
        Ok(Self::with_reader(reader, span, options))
    }
}

impl<R: BufRead> Query<R> {
    /// Query an already opened source. `origin` names it in errors and logs.
    pub fn from_reader(source: R, origin: impl Into<PathBuf>, options: &QueryOptions) -> Result<Self> {
        let origin = origin.into();
        let span = query_span(&origin);
        let reader = {
            let _enter = span.enter();
            BatchReader::from_reader(source, origin, &options.reader)?
        };
        Ok(Self::with_reader(reader, span, options))
    }

    fn with_reader(reader: BatchReader<R>, span: Span, options: &QueryOptions) -> Self {
        span.in_scope(|| {
            info!(
                window = %options.window,
                include_names = options.include_names,
                batch_size = reader.batch_size(),
                "Query started"
            );
        });
        Self {
            reader,
            window: options.window,
            table: ResultTable::new(options.include_names),
            span,
            batches: 0,
        }
    }

    /// Read, normalize, filter and merge the next batch.
    pub fn next_batch(&mut self) -> Option<Result<BatchReport>> {
        let _enter = self.span.enter();
        let batch = match self.reader.next()? {
            Ok(batch) => batch,
            Err(err) => return Some(Err(err)),
        };
        self.batches += 1;
        let records = batch.len();

        let entries = match process_batch(batch, &self.window) {
            Ok(entries) => entries,
            Err(err) => return Some(Err(err)),
        };
        self.table.merge(&entries);

        let under_pressure = self.reader.last_batch_under_pressure();
        if under_pressure {
            let stats = self.reader.memory().stats();
            warn!(
                batch = self.batches,
                records = records,
                level = ?self.reader.last_batch_pressure(),
                peak_bytes = stats.peak_usage,
                limit_bytes = stats.memory_limit,
                "Memory pressure while reading batch"
            );
        }

        let report = BatchReport {
            index: self.batches,
            records,
            kept: entries.len(),
            table_rows: self.table.len(),
            pressure: self.reader.last_batch_pressure(),
            under_pressure,
        };
        debug!(
            batch = report.index,
            records = report.records,
            kept = report.kept,
            rows = report.table_rows,
            "Batch merged"
        );
        Some(Ok(report))
    }

    /// Drain every remaining batch and return the finished table.
    pub fn run(mut self) -> Result<ResultTable> {
        while let Some(report) = self.next_batch() {
            report?;
        }
        let stats = self.reader.stats();
        self.span.in_scope(|| {
            info!(
                records = stats.records_read,
                batches = stats.batches_emitted,
                peak_batch = stats.peak_batch_len,
                pressured_batches = stats.pressured_batches,
                rows = self.table.len(),
                "Query finished"
            );
        });
        Ok(self.table)
    }

    /// Totals merged so far.
    pub fn table(&self) -> &ResultTable {
        &self.table
    }

    /// Stop reading and keep the totals merged so far.
    pub fn into_table(self) -> ResultTable {
        self.table
    }

    pub fn stats(&self) -> ReaderStats {
        self.reader.stats()
    }
}

/// Run a complete query over the time sheet at `path`.
pub fn query(path: &Path, options: &QueryOptions) -> Result<ResultTable> {
    Query::open(path, options)?.run()
}

/// Run a complete query over an in-memory or already opened document.
pub fn query_reader<R: BufRead>(source: R, origin: &Path, options: &QueryOptions) -> Result<ResultTable> {
    Query::from_reader(source, origin, options)?.run()
}

/// Normalize a batch and keep the entries inside `window`.
#[cfg(not(feature = "parallel"))]
pub fn process_batch(batch: Vec<RawRecord>, window: &DateWindow) -> Result<Vec<NormalizedEntry>> {
    let entries = batch
        .into_iter()
        .map(transform_owned)
        .collect::<Result<Vec<_>>>()?;
    Ok(filter_entries(entries, window))
}

/// Normalize a batch and keep the entries inside `window`.
///
/// Records are normalized on the rayon pool; the merge that follows stays on
/// the calling thread.
#[cfg(feature = "parallel")]
pub fn process_batch(batch: Vec<RawRecord>, window: &DateWindow) -> Result<Vec<NormalizedEntry>> {
    use rayon::prelude::*;

    let entries = batch
        .into_par_iter()
        .map(transform_owned)
        .collect::<Result<Vec<_>>>()?;
    Ok(filter_entries(entries, window))
}

fn query_span(origin: &Path) -> Span {
    info_span!(
        "query",
        query_id = %Uuid::new_v4(),
        source = %origin.display()
    )
}
