//! Output formatting and CSV export

use crate::error::ScanResult;
use crate::scanner::{AccumulatedResults, ProbeResult};
use chrono::{DateTime, Local};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Header row of every CSV export
pub const CSV_HEADER: [&str; 4] = ["IP Address", "Port", "Status", "Server Name"];

pub const CSV_MIME_TYPE: &str = "text/csv";

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// A finished CSV export, ready to hand out as a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl CsvExport {
    /// Write the bytes into `dir` under the export's own filename
    pub fn save_in<P: AsRef<Path>>(&self, dir: P) -> io::Result<std::path::PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        let mut file = File::create(&path)?;
        file.write_all(&self.bytes)?;
        Ok(path)
    }
}

/// `port_scan_results_<YYYY-MM-DD_HH-MM-SS>.csv`
pub fn export_filename(at: DateTime<Local>) -> String {
    format!("port_scan_results_{}.csv", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Write results as CSV, header first, rows in accumulation order
pub fn write_csv<W: Write>(writer: W, results: &[ProbeResult]) -> ScanResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(CSV_HEADER)?;
    for result in results {
        wtr.write_record([
            result.address.to_string().as_str(),
            result.port.to_string().as_str(),
            result.status.as_str(),
            result.server_name.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Serialize results into an in-memory CSV export stamped with `at`
pub fn export_csv_at(results: &[ProbeResult], at: DateTime<Local>) -> ScanResult<CsvExport> {
    let mut bytes = Vec::new();
    write_csv(&mut bytes, results)?;
    Ok(CsvExport {
        filename: export_filename(at),
        mime_type: CSV_MIME_TYPE,
        bytes,
    })
}

pub fn export_csv(results: &[ProbeResult]) -> ScanResult<CsvExport> {
    export_csv_at(results, Local::now())
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
    pub show_closed: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            show_closed: false,
        }
    }
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write scan results to the configured file, or stdout
    pub fn write_results(&self, results: &AccumulatedResults) -> ScanResult<()> {
        let output = match self.config.format {
            OutputFormat::Text => self.format_text(results).into_bytes(),
            OutputFormat::Json => serde_json::to_vec_pretty(results)?,
            OutputFormat::Csv => {
                let mut bytes = Vec::new();
                write_csv(&mut bytes, results.as_slice())?;
                bytes
            }
        };

        match &self.config.file {
            Some(filename) => {
                let mut file = File::create(filename)?;
                file.write_all(&output)?;
            }
            None => {
                io::stdout().write_all(&output)?;
            }
        }

        Ok(())
    }

    /// Format results as a text table
    pub fn format_text(&self, results: &AccumulatedResults) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\nFound {} open ports out of {} scanned\n\n",
            results.open_count(),
            results.len()
        ));

        let rows: Vec<&ProbeResult> = results
            .iter()
            .filter(|r| self.config.show_closed || r.is_reachable())
            .collect();

        if rows.is_empty() {
            return output;
        }

        let name_width = rows
            .iter()
            .map(|r| r.server_name.len())
            .max()
            .unwrap_or(0)
            .max(CSV_HEADER[3].len());

        output.push_str(&format!(
            "{:<16} {:<6} {:<7} {:<width$}\n",
            CSV_HEADER[0],
            CSV_HEADER[1],
            CSV_HEADER[2],
            CSV_HEADER[3],
            width = name_width
        ));

        for result in rows {
            let line = format!(
                "{:<16} {:<6} {:<7} {:<width$}\n",
                result.address.to_string(),
                result.port,
                result.status.as_str(),
                result.server_name,
                width = name_width
            );
            let color = if result.is_reachable() { "green" } else { "gray" };
            output.push_str(&self.colorize(&line, color));
        }

        output
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.config.colored {
            return text.to_string();
        }

        match color {
            "green" => text.bright_green().to_string(),
            "gray" => text.bright_black().to_string(),
            _ => text.to_string(),
        }
    }
}
