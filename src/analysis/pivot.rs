//! Pivot tables from aggregated measurements.
//!
//! [`build_pivot`] runs the whole grouping pipeline for one request:
//! classify fields, sort, group into controlled sets, series and replicate
//! cells, aggregate, and filter out series too short to plot.
//! [`CompatibleSet::table`] then lays one set out as rows of variable
//! values against columns of group values.

use super::aggregator::{aggregate_replicates, minimum, AggregatedCell};
use super::fields::FieldRoles;
use super::grouping::{build_tree, compare_by_keys};
use crate::error::Result;
use crate::models::{Cell, PivotTable, Record, RecordSet, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Measure whose raw values are nanoseconds.
pub const RESPONSE_TIME: &str = "response_time";

/// Thresholds for keeping series and sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotOptions {
    /// Minimum distinct variable values of a series.
    pub min_series_length: usize,
    /// Minimum series of a compatible set.
    pub min_series_width: usize,
}

impl Default for PivotOptions {
    fn default() -> Self {
        Self {
            min_series_length: 2,
            min_series_width: 1,
        }
    }
}

/// One plot series: aggregated cells of a single group value.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub group: Value,
    /// Variable value to its aggregated cell, ascending.
    pub cells: BTreeMap<Value, AggregatedCell>,
}

/// Series whose records agree on every controlled dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibleSet {
    /// Controlled field values shared by the whole set.
    pub fixed: BTreeMap<String, Value>,
    /// Ascending by group value.
    pub series: Vec<PlotSeries>,
}

/// Result of one pivot request.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub roles: FieldRoles,
    pub sets: Vec<CompatibleSet>,
}

/// Pivot `records` with the default minimum statistic.
pub fn build_pivot(
    records: &RecordSet,
    group: &str,
    variable: &str,
    measure: &str,
    options: PivotOptions,
) -> Result<Pivot> {
    let roles = FieldRoles::classify(records.keys(), group, variable, measure)?;
    build_pivot_with(records, roles, options, &minimum)
}

/// Pivot `records` under `roles`, aggregating replicates with `stat`.
pub fn build_pivot_with<F>(
    records: &RecordSet,
    roles: FieldRoles,
    options: PivotOptions,
    stat: &F,
) -> Result<Pivot>
where
    F: Fn(&[&Value]) -> Value + ?Sized,
{
    let sort_keys = roles.sort_keys();
    let mut sorted: Vec<&Record> = records.records().iter().collect();
    sorted.sort_by(|a, b| compare_by_keys(&sort_keys, a, b));

    let measurements = sorted
        .into_iter()
        .map(|r| roles.project(r))
        .collect::<Result<Vec<_>>>()?;

    let mut sets = Vec::new();
    for controlled in build_tree(measurements) {
        let mut series = Vec::new();
        for group in controlled.series {
            let mut cells = BTreeMap::new();
            for cell in group.cells {
                let aggregated = aggregate_replicates(cell, &roles, stat)?;
                cells.insert(aggregated.variable.clone(), aggregated);
            }
            if cells.len() < options.min_series_length {
                debug!(
                    "Dropping series {} with {} variable values",
                    group.group,
                    cells.len()
                );
                continue;
            }
            series.push(PlotSeries {
                group: group.group,
                cells,
            });
        }

        if series.is_empty() || series.len() < options.min_series_width {
            continue;
        }
        let fixed = roles
            .controlled
            .iter()
            .cloned()
            .zip(controlled.controlled)
            .collect();
        sets.push(CompatibleSet { fixed, series });
    }

    Ok(Pivot { roles, sets })
}

/// How to lay out a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptions<'a> {
    pub axis_label: &'a str,
    /// Turn nanosecond response times into decimal seconds.
    pub convert_to_seconds: bool,
}

impl CompatibleSet {
    /// Table of `field` per (variable value, group value).
    ///
    /// Rows cover every variable value seen in any series; cells missing
    /// from a series are null.
    pub fn table(&self, roles: &FieldRoles, field: &str, options: TableOptions<'_>) -> PivotTable {
        let variables: BTreeSet<&Value> = self.series.iter().flat_map(|s| s.cells.keys()).collect();

        let mut headers = vec![options.axis_label.to_string()];
        headers.extend(self.series.iter().map(|s| s.group.to_string()));

        let mut rows: Vec<Vec<Cell>> = variables
            .into_iter()
            .map(|v| {
                let mut row = vec![Cell::from(v)];
                row.extend(self.series.iter().map(|s| {
                    let value = s.cells.get(v).and_then(|c| c.lookup(roles, field));
                    to_cell(value, field, options.convert_to_seconds)
                }));
                row
            })
            .collect();

        if roles.variable == "id" {
            rows.sort_by(|a, b| rank(a).total_cmp(&rank(b)));
        }

        PivotTable { headers, rows }
    }
}

fn to_cell(value: Option<&Value>, field: &str, convert_to_seconds: bool) -> Cell {
    match value {
        Some(Value::Int(ns)) if convert_to_seconds && field == RESPONSE_TIME => {
            Cell::Float(*ns as f64 / 1e9)
        }
        Some(v) => Cell::from(v),
        None => Cell::Null,
    }
}

/// Sort rank of a row by its first data column.
///
/// A zero measurement ranks with the missing ones.
fn rank(row: &[Cell]) -> f64 {
    row.get(1)
        .and_then(Cell::as_f64)
        .filter(|v| *v != 0.0)
        .unwrap_or(-1.0)
}
