//! Report output.

pub mod generator;

pub use generator::{build_report, write_json_report};
