//! Error types for ingestion and the grouping core.
//!
//! Every variant here is fatal for the run that produced it. The only
//! recoverable outcome ("nothing to plot") is not an error; see
//! [`crate::analysis::request::RequestOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, preprocessing or pivoting measurements.
#[derive(Debug, Error)]
pub enum PivotError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("records have different amount of data: expected {expected} fields, got {actual} at line {lineno}")]
    SchemaMismatch {
        lineno: i64,
        expected: usize,
        actual: usize,
    },

    #[error("missing required field '{field}'{}", line_suffix(.lineno))]
    MissingField { field: String, lineno: Option<i64> },

    #[error("unsupported value for field '{field}' at line {lineno}: {found}")]
    UnsupportedValue {
        field: String,
        lineno: i64,
        found: String,
    },

    #[error("invalid multiplier {value} at line {lineno}")]
    InvalidMultiplier { lineno: i64, value: String },

    #[error("expecting {expected} measurements, got {actual} (benchmark at line {lineno})")]
    ReplicateCountMismatch {
        expected: i64,
        actual: usize,
        lineno: i64,
    },
}

fn line_suffix(lineno: &Option<i64>) -> String {
    match lineno {
        Some(n) => format!(" at line {}", n),
        None => String::new(),
    }
}

/// Result alias for the grouping core.
pub type Result<T> = std::result::Result<T, PivotError>;
