//! Output Formatting and Display Management
//!
//! Renders a [`ResultTable`] either as a colored terminal table or as JSON
//! rows for programmatic consumption.
//!
//! ## Output Formats
//!
//! ### Text
//! One line per row, ordered by date then name, followed by a totals line:
//! ```text
//! date        full_name    hours
//! 01-01-2020  d.vader       6.00
//! 01-01-2020  h.simpson     9.00
//! ```
//!
//! ### JSON
//! An array of row objects. `full_name` is present only when the query was
//! broken down by person:
//! ```json
//! [
//!   { "date": "01-01-2020", "total_hours": 15.0 },
//!   { "date": "02-01-2020", "total_hours": 8.0 }
//! ]
//! ```
//!
//! Rendering is separated from printing so both forms can be tested without
//! capturing stdout.

use crate::aggregate::ResultTable;
use colored::Colorize;
use std::fmt::Write;

const DATE_WIDTH: usize = 10;
const HOURS_WIDTH: usize = 10;

pub struct DisplayManager;

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayManager {
    pub fn new() -> Self {
        Self
    }

    /// Print the table to stdout in the requested format.
    pub fn display_table(&self, table: &ResultTable, json_output: bool) {
        if json_output {
            match self.render_json(table) {
                Ok(json_str) => println!("{}", json_str),
                Err(e) => eprintln!("Error serializing results to JSON: {}", e),
            }
            return;
        }

        println!("\n{}", "=".repeat(60).bright_cyan());
        println!("{}", "Time Sheet Report - Hours Worked".bright_white().bold());
        println!("{}", "=".repeat(60).bright_cyan());
        print!("{}", self.render_text(table));
    }

    /// Pretty-printed JSON array of rows.
    pub fn render_json(&self, table: &ResultTable) -> serde_json::Result<String> {
        serde_json::to_string_pretty(table)
    }

    /// Text table with a header and a totals line.
    pub fn render_text(&self, table: &ResultTable) -> String {
        let mut out = String::new();

        if table.is_empty() {
            let _ = writeln!(out, "\n{}", "No time records match the query.".yellow());
            return out;
        }

        let rows = table.rows();
        let name_width = rows
            .iter()
            .filter_map(|row| row.full_name.as_deref())
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max("full_name".len());

        let _ = writeln!(out);
        if table.include_names() {
            let _ = writeln!(
                out,
                "{}",
                format!(
                    "{:<dw$}  {:<nw$}  {:>hw$}",
                    "date",
                    "full_name",
                    "hours",
                    dw = DATE_WIDTH,
                    nw = name_width,
                    hw = HOURS_WIDTH
                )
                .bright_white()
                .bold()
            );
        } else {
            let _ = writeln!(
                out,
                "{}",
                format!("{:<dw$}  {:>hw$}", "date", "hours", dw = DATE_WIDTH, hw = HOURS_WIDTH)
                    .bright_white()
                    .bold()
            );
        }

        for row in &rows {
            let date = format!("{:<width$}", row.date_string(), width = DATE_WIDTH);
            let hours = format!("{:>width$}", row.total_hours, width = HOURS_WIDTH);
            match &row.full_name {
                Some(name) => {
                    let name = format!("{:<width$}", name, width = name_width);
                    let _ = writeln!(
                        out,
                        "{}  {}  {}",
                        date.bright_blue(),
                        name.bright_cyan(),
                        hours.bright_green()
                    );
                }
                None => {
                    let _ = writeln!(out, "{}  {}", date.bright_blue(), hours.bright_green());
                }
            }
        }

        let _ = writeln!(
            out,
            "\n{} rows • {} hours total",
            rows.len().to_string().bright_white().bold(),
            table.total().to_string().bright_green().bold()
        );
        out
    }
}
