//! Grouping, aggregation and pivoting of measurement records.
//!
//! The pipeline for one plot request runs field classification
//! ([`fields`]), ordering and grouping ([`grouping`]), replicate
//! aggregation ([`aggregator`]) and pivoting ([`pivot`]); [`request`]
//! drives it per configured plot and [`fit`] adds trend lines.

pub mod aggregator;
pub mod fields;
pub mod fit;
pub mod grouping;
pub mod pivot;
pub mod request;

pub use pivot::PivotOptions;
pub use request::{run_request, PageCounter, PlotRequest, RequestOutcome, RequestSettings};
