//! JSON report generation.
//!
//! Collects the tables every plot request produced into one document
//! that plotting tools read back.

use crate::analysis::RequestOutcome;
use crate::models::{PlotOutput, Report, ReportMetadata, SkippedRequest};
use anyhow::{Context, Result};
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Assemble the report from the outcome of every request, in run order.
pub fn build_report(
    sources: &[PathBuf],
    records: usize,
    outcomes: Vec<(String, RequestOutcome)>,
    duration_seconds: f64,
) -> Report {
    let requests_run = outcomes.len();
    let mut plots: Vec<PlotOutput> = Vec::new();
    let mut skipped = Vec::new();

    for (name, outcome) in outcomes {
        match outcome {
            RequestOutcome::Plotted(mut produced) => plots.append(&mut produced),
            RequestOutcome::Skipped { reason } => skipped.push(SkippedRequest { name, reason }),
        }
    }

    let metadata = ReportMetadata {
        generated_at: Utc::now(),
        sources: sources.iter().map(|p| p.display().to_string()).collect(),
        records,
        requests_run,
        plots: plots.len(),
        skipped,
        duration_seconds,
    };

    Report { metadata, plots }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write a JSON report to a file.
pub fn write_json_report(report: &Report, path: &Path) -> Result<()> {
    let content = generate_json_report(report)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    file.write_all(b"\n")?;

    Ok(())
}
