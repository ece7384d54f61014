//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// benchpivot - pivot tables from native call benchmark measurements
///
/// Reads benchmark measurement files, groups replicate measurements of
/// the same benchmark, aggregates them and writes one pivot table per
/// plot request to a JSON report.
///
/// Examples:
///   benchpivot --input results/
///   benchpivot --input results/ --multiplier 3 --seconds
///   benchpivot --input results/benchmarks-1.json --group direction --variable dynamic_size --measure response_time
///   benchpivot --input results/ --request basic-call,special-calls
///   benchpivot --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Data file, or directory searched for data files
    #[arg(short, long, value_name = "PATH", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to general.output from the config file (pivot_report.json).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .benchpivot.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Declared replicate count of the campaign
    ///
    /// Multiplies any per-record multiplier. Can also be set via BENCHPIVOT_MULTIPLIER.
    #[arg(long, value_name = "N", env = "BENCHPIVOT_MULTIPLIER")]
    pub multiplier: Option<i64>,

    /// Global repetition count for records that carry none
    #[arg(long, value_name = "N")]
    pub repetitions: Option<i64>,

    /// Report response times in seconds instead of nanoseconds
    #[arg(long)]
    pub seconds: bool,

    /// Do not fit trend lines
    #[arg(long)]
    pub no_fit: bool,

    /// Minimum number of variable values of a plotted series
    #[arg(long, value_name = "N")]
    pub min_series_length: Option<usize>,

    /// Minimum number of series of a plotted table
    #[arg(long, value_name = "N")]
    pub min_series_width: Option<usize>,

    /// Run only the named plot requests (comma-separated)
    ///
    /// Example: --request basic-call,special-calls
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub request: Option<Vec<String>>,

    /// Group field of an ad-hoc request (one series per value)
    #[arg(long, value_name = "FIELD", requires = "variable")]
    pub group: Option<String>,

    /// Variable field of an ad-hoc request (x axis)
    #[arg(long, value_name = "FIELD", requires = "measure")]
    pub variable: Option<String>,

    /// Measure field of an ad-hoc request
    #[arg(long, value_name = "FIELD", requires = "group")]
    pub measure: Option<String>,

    /// Dry run: read the data files and list them without pivoting
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when every request was skipped
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .benchpivot.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.exists() => {
                return Err(format!("Input path does not exist: {}", input.display()));
            }
            None => return Err("An input path is required".to_string()),
            _ => {}
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(multiplier) = self.multiplier {
            if multiplier < 1 {
                return Err("Multiplier must be at least 1".to_string());
            }
        }
        if let Some(repetitions) = self.repetitions {
            if repetitions < 1 {
                return Err("Repetitions must be at least 1".to_string());
            }
        }

        if self.min_series_length == Some(0) {
            return Err("Minimum series length must be at least 1".to_string());
        }

        if let Some(ref names) = self.request {
            if self.adhoc_request().is_some() {
                return Err("Cannot combine --request with --group/--variable/--measure".to_string());
            }
            if names.iter().any(|n| n.trim().is_empty()) {
                return Err("Request names must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Group, variable and measure of the ad-hoc request, when all are given.
    pub fn adhoc_request(&self) -> Option<(&str, &str, &str)> {
        match (&self.group, &self.variable, &self.measure) {
            (Some(g), Some(v), Some(m)) => Some((g, v, m)),
            _ => None,
        }
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `general.verbose` from the configuration file.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
