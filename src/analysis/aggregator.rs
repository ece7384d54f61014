//! Replicate aggregation.
//!
//! Collapses the repeated measurements of one (controlled, group, variable)
//! cell into a single summary value, after checking that the campaign
//! produced exactly the declared number of replicates.

use super::fields::FieldRoles;
use super::grouping::ReplicateCell;
use crate::error::{PivotError, Result};
use crate::models::Value;
use std::collections::BTreeMap;
use tracing::error;

/// Summary of one replicate cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedCell {
    pub variable: Value,
    /// Statistic of the replicate measure values.
    pub measure: Value,
    /// Metadata of one of the replicates.
    pub info: BTreeMap<String, Value>,
    pub replicates: usize,
    pub lineno: i64,
}

impl AggregatedCell {
    /// Look up `field` in this cell: the measure first, falling back to
    /// the info mapping when the measure is absent or another field is asked.
    pub fn lookup(&self, roles: &FieldRoles, field: &str) -> Option<&Value> {
        if field == roles.measure && !self.measure.is_absent() {
            return Some(&self.measure);
        }
        if field == roles.variable {
            return Some(&self.variable);
        }
        self.info.get(field)
    }
}

/// Smallest value under [`Value`]'s total order.
pub fn minimum(values: &[&Value]) -> Value {
    values.iter().min().map(|v| (*v).clone()).unwrap_or_default()
}

/// Aggregate `cell` with `stat` over its measure values.
///
/// Fails when the number of replicates differs from the multiplier the
/// measurements declare.
pub fn aggregate_replicates<F>(cell: ReplicateCell, roles: &FieldRoles, stat: &F) -> Result<AggregatedCell>
where
    F: Fn(&[&Value]) -> Value + ?Sized,
{
    let values: Vec<&Value> = cell.replicates.iter().map(|m| &m.measure).collect();
    let measure = stat(&values);

    let representative = match cell.replicates.last() {
        Some(m) => m,
        None => {
            return Err(PivotError::ReplicateCountMismatch {
                expected: 1,
                actual: 0,
                lineno: 0,
            })
        }
    };

    let actual = cell.replicates.len();
    if actual as i64 != representative.multiplier {
        error!(
            "Expecting {} measurements, got {} (line {})",
            representative.multiplier, actual, representative.lineno
        );
        return Err(PivotError::ReplicateCountMismatch {
            expected: representative.multiplier,
            actual,
            lineno: representative.lineno,
        });
    }

    Ok(AggregatedCell {
        variable: cell.variable,
        measure,
        info: roles
            .info
            .iter()
            .cloned()
            .zip(representative.info.iter().cloned())
            .collect(),
        replicates: actual,
        lineno: representative.lineno,
    })
}
