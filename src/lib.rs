//! Time-Sheet Hours Library
//!
//! A streaming aggregator for clock-in/clock-out time sheets stored as XML.
//! It sums the hours worked per calendar day, optionally broken down by
//! person, over files far larger than memory.
//!
//! ## Core Features
//!
//! - **Streaming**: a forward-only quick-xml event reader hands out bounded
//!   batches of records; no document tree is ever built
//! - **Incremental validation**: every event is checked against the fixed
//!   `people/person/start/end` shape as it is read
//! - **Incremental aggregation**: each batch is summed on its own and folded
//!   into the running table, so the result does not depend on batch size
//! - **Date filtering**: inclusive `DD-MM-YYYY` windows, open on either side
//! - **Flexible output**: colored text tables and JSON rows
//!
//! ## Architecture Overview
//!
//! - [`schema`] - Incremental schema validator and standalone validation
//! - [`reader`] - Batch reader over the validated event stream
//! - [`transform`] - Raw record to dated, measured entry
//! - [`filter`] - Inclusive date windows
//! - [`aggregate`] - Running result table and incremental merge
//! - [`query`] - Orchestrates read, transform, filter and merge
//! - [`models`] - Records, fixed-point hours and result rows
//! - [`error`] - Engine error kinds
//! - [`memory`] - Per-reader memory accounting
//! - [`config`] - Configuration with file and environment overrides
//! - [`logging`] - Structured logging with JSON and pretty formats
//! - [`display`] - Terminal and JSON output
//! - [`generator`] - Synthetic time-sheet files
//!
//! ## Main Entry Point
//!
//! ```no_run
//! use std::path::Path;
//! use timesheet_hours::{query, QueryOptions};
//!
//! # fn example() -> timesheet_hours::Result<()> {
//! let options = QueryOptions::from_bounds(Some("01-01-2020"), None, true)?;
//! let table = query(Path::new("timesheet.xml"), &options)?;
//! for row in table.rows() {
//!     println!("{} {:?} {}", row.date_string(), row.full_name, row.total_hours);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Types
//!
//! - [`Query`] - Stepwise query over one file
//! - [`ResultTable`] - Sorted totals keyed by date (and name)
//! - [`Hours`] - Hours in fixed-point hundredths
//! - [`TimesheetError`] - What went wrong, by kind

pub mod aggregate;
pub mod config;
pub mod display;
pub mod error;
pub mod filter;
pub mod generator;
pub mod logging;
pub mod memory;
pub mod models;
pub mod query;
pub mod reader;
pub mod schema;
pub mod timestamp_parser;
pub mod transform;

pub use aggregate::{merge, ResultTable};
pub use error::{Result, TimesheetError};
pub use filter::{filter_entries, DateWindow};
pub use models::*;
pub use query::{query, Query, QueryOptions};
pub use reader::{read_batches, BatchReader, ReaderOptions};
pub use schema::{validate_file, validate_fragment};
pub use transform::transform;
