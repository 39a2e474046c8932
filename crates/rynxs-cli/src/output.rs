//! Exit codes and small formatting helpers shared by every subcommand.

use serde::Serialize;
use std::fmt;

/// Process exit codes used throughout this binary: `0` success, `1`
/// verification or logic failure, `2` I/O or not-found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// The command completed and whatever it checked held.
    Ok = 0,
    /// The command ran to completion but found an inconsistency (a bad
    /// signature, a broken chain, a missing action result, ...).
    Invalid = 1,
    /// The command could not run at all: a missing file, unreadable log,
    /// or similar.
    IoError = 2,
}

impl ExitCode {
    /// The raw process exit status.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Print `value` as pretty JSON, or fall back to its `Display` rendering
/// via `as_text` if `json` is false.
pub fn emit<T: Serialize>(value: &T, json: bool, as_text: impl FnOnce(&T) -> String) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize output as JSON: {e}"),
        }
    } else {
        println!("{}", as_text(value));
    }
}

/// A simple two-column table renderer, used by `log tail`/`log inspect`
/// when `--json` isn't given.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// A new table with the given column headers.
    pub fn new(headers: &[&str]) -> Self {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row. Must have the same arity as `headers`.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let header_line: Vec<String> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
            .collect();
        writeln!(f, "{}", header_line.join("  "))?;

        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", sep.join("  "))?;

        for row in &self.rows {
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
                .collect();
            writeln!(f, "{}", line.join("  "))?;
        }
        Ok(())
    }
}
