use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process;
use timesheet_hours::config::Config;
use timesheet_hours::display::DisplayManager;
use timesheet_hours::generator::write_sample_file;
use timesheet_hours::logging::init_logging;
use timesheet_hours::query::{query, QueryOptions};
use timesheet_hours::schema::validate_file;
use timesheet_hours::timestamp_parser::TimestampParser;
use timesheet_hours::DateWindow;
use tracing::debug;

#[derive(Parser)]
#[command(name = "timesheet-hours")]
#[command(about = "Streaming time-sheet analysis: hours worked per day and per person")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sum hours worked per day, optionally per person
    Query {
        /// Source time-sheet file (.xml)
        file: PathBuf,
        /// Start date filter (DD-MM-YYYY), inclusive
        #[arg(short, long, value_parser = parse_date_arg)]
        start: Option<String>,
        /// End date filter (DD-MM-YYYY), inclusive
        #[arg(short, long, value_parser = parse_date_arg)]
        end: Option<String>,
        /// Break the totals down by person
        #[arg(short, long)]
        names: bool,
        /// Records per batch (overrides configuration)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Check a time-sheet file against the schema
    Validate {
        /// Source time-sheet file (.xml)
        file: PathBuf,
    },
    /// Write a synthetic time-sheet file
    Generate {
        /// Destination file
        file: PathBuf,
        /// Number of random records after the control record
        records: usize,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_date_arg(value: &str) -> std::result::Result<String, String> {
    TimestampParser::parse_date(value)
        .map(|_| value.to_string())
        .map_err(|_| format!("{} is not a valid date in DD-MM-YYYY format.", value))
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => handle_error(e),
    };

    let _log_guard = match config.ensure_log_directory() {
        Ok(()) => init_logging(&config.logging, &config.paths.log_directory),
        Err(e) => handle_error(e),
    };

    if let Err(e) = run(cli.command, &config) {
        handle_error(e);
    }
}

fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Query {
            file,
            start,
            end,
            names,
            batch_size,
            json,
        } => {
            let window = DateWindow::parse(start.as_deref(), end.as_deref())?;
            let mut options = QueryOptions::from_config(config)
                .window(window)
                .include_names(names);
            if let Some(batch_size) = batch_size {
                options = options.batch_size(batch_size);
            }
            debug!(file = %file.display(), window = %window, "Running query");

            let table = query(&file, &options)?;
            DisplayManager::new().display_table(&table, json);
        }
        Commands::Validate { file } => {
            let summary = validate_file(&file)?;
            println!(
                "{} is valid: {} records, {} bytes",
                file.display(),
                summary.records,
                summary.bytes
            );
        }
        Commands::Generate {
            file,
            records,
            seed,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            println!(
                "Generating sample time-sheet data XML file: {}, with number of records: {}",
                file.display(),
                records
            );
            let bytes = write_sample_file(&file, records, &mut rng)
                .context("Sample data generation failed")?;
            println!("Wrote {} bytes", bytes);
        }
    }
    Ok(())
}

fn handle_error(error: anyhow::Error) -> ! {
    eprintln!("Error. {:#}", error);
    process::exit(1);
}
