//! Metric and example file writers.
//!
//! Metrics are written as CSV with the header
//! `text,total_positions,total_matches,num_suggestions,divergence,avg`, or as
//! pretty-printed JSON when the output path ends in `.json`.

use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tactic_analysis::RuleMetrics;
use thiserror::Error;

/// Errors from writing reports.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Creating or writing the file failed.
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization failed.
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Comma-separated values.
    Csv,
    /// Pretty-printed JSON array.
    Json,
}

impl ReportFormat {
    /// JSON for `.json` paths, CSV otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ReportFormat::Json,
            _ => ReportFormat::Csv,
        }
    }
}

/// A labelled training example: a position, a move and whether it is the
/// engine's top choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelledExample {
    /// Position in FEN.
    pub fen: String,
    /// Move in UCI notation.
    pub uci: String,
    /// 1 for the engine's best move, 0 otherwise.
    pub label: u8,
}

/// Writes rule metrics to `path` in the format its extension selects.
pub fn write_metrics<P: AsRef<Path>>(path: P, metrics: &[RuleMetrics]) -> Result<(), ReportError> {
    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);
    match ReportFormat::from_path(path) {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut file, metrics)?;
            writeln!(file)?;
        }
        ReportFormat::Csv => {
            writeln!(
                file,
                "text,total_positions,total_matches,num_suggestions,divergence,avg"
            )?;
            for m in metrics {
                writeln!(
                    file,
                    "{},{},{},{},{:?},{:?}",
                    csv_field(&m.rule),
                    m.total_positions,
                    m.total_matches,
                    m.num_suggestions,
                    m.divergence,
                    m.avg
                )?;
            }
        }
    }
    file.flush()?;
    Ok(())
}

/// Writes labelled examples as CSV with the header `fen,uci,label`.
pub fn write_examples<P: AsRef<Path>>(path: P, examples: &[LabelledExample]) -> Result<(), ReportError> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "fen,uci,label")?;
    for example in examples {
        writeln!(
            file,
            "{},{},{}",
            csv_field(&example.fen),
            csv_field(&example.uci),
            example.label
        )?;
    }
    file.flush()?;
    Ok(())
}

/// Quotes a field if it contains a delimiter, a quote or a line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
