//! Data models for measurement records, pivot tables and reports.
//!
//! Records are flat field maps whose keys are only given roles per pivot
//! request. A [`RecordSet`] owns a list of records that all share one key
//! set; it is the only way records travel past ingestion.

use crate::analysis::fit::Polynomial;
use crate::error::{PivotError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single field value of a measurement record.
///
/// The derived ordering puts `Absent` before every present value and
/// integers before strings, so records with heterogeneous cells still sort
/// into one total order.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum Value {
    /// Empty or dash cell.
    #[default]
    Absent,
    Int(i64),
    Text(String),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => write!(f, "-"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// One measurement row: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Value of `key`, treating a missing key as absent.
    pub fn value(&self, key: &str) -> &Value {
        const ABSENT: &Value = &Value::Absent;
        self.0.get(key).unwrap_or(ABSENT)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Source line of this record, when ingestion assigned one.
    pub fn lineno(&self) -> Option<i64> {
        self.int("lineno")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Records sharing one identical key set.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
    keys: BTreeSet<String>,
}

impl RecordSet {
    /// Validates that every record carries the same keys as the first one.
    pub fn new(records: Vec<Record>) -> Result<Self> {
        let keys: BTreeSet<String> = match records.first() {
            Some(first) => first.keys().cloned().collect(),
            None => BTreeSet::new(),
        };

        for record in &records {
            if record.len() != keys.len() || !record.keys().all(|k| keys.contains(k)) {
                return Err(PivotError::SchemaMismatch {
                    lineno: record.lineno().unwrap_or(-1),
                    expected: keys.len(),
                    actual: record.len(),
                });
            }
        }

        Ok(Self { records, keys })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep the records matching `predicate`. The key set is unchanged.
    pub fn select(&self, predicate: impl Fn(&Record) -> bool) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
            keys: self.keys.clone(),
        }
    }

    /// Drop every key matching one of `patterns` from all records.
    ///
    /// A pattern ending in `*` matches by prefix.
    pub fn without_keys(mut self, patterns: &[String]) -> Self {
        if patterns.is_empty() {
            return self;
        }
        let removed: Vec<String> = self
            .keys
            .iter()
            .filter(|k| patterns.iter().any(|p| key_matches(p, k)))
            .cloned()
            .collect();
        for record in &mut self.records {
            for key in &removed {
                record.remove(key);
            }
        }
        for key in &removed {
            self.keys.remove(key);
        }
        self
    }

    /// Apply `f` to every record and re-validate the shared key set.
    pub fn try_map(self, mut f: impl FnMut(&mut Record)) -> Result<Self> {
        let mut records = self.records;
        records.iter_mut().for_each(|r| f(r));
        Self::new(records)
    }

    pub fn distinct_values(&self, field: &str) -> BTreeSet<&Value> {
        self.records.iter().map(|r| r.value(field)).collect()
    }
}

fn key_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => pattern == key,
    }
}

/// A pivot table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(n) => Some(*n as f64),
            Cell::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Absent => Cell::Null,
            Value::Int(n) => Cell::Int(*n),
            Value::Text(s) => Cell::Text(s.clone()),
        }
    }
}

/// Rows of one variable value each, columns of one group value each.
///
/// `rows[i][0]` is the variable value; `rows[i][j]` belongs to `headers[j]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl PivotTable {
    /// Number of data columns (excluding the variable column).
    pub fn series_count(&self) -> usize {
        self.headers.len().saturating_sub(1)
    }

    /// Numeric x values, or `None` when any row has a non-numeric variable.
    pub fn numeric_x(&self) -> Option<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| row.first().and_then(Cell::as_f64))
            .collect()
    }
}

/// Fitted trend lines for one pivot table.
#[derive(Debug, Clone, Serialize)]
pub struct FitOutput {
    /// Page number of the overlay plot.
    pub page: usize,
    pub identifier: String,
    /// One entry per data column; `None` when the column could not be fitted.
    pub polynomials: Vec<Option<Polynomial>>,
    /// Measured columns followed by the fitted columns.
    pub overlay: PivotTable,
}

/// One plot-series table produced by a request.
#[derive(Debug, Clone, Serialize)]
pub struct PlotOutput {
    pub identifier: String,
    pub title: String,
    pub page: usize,
    pub group: String,
    pub variable: String,
    pub measure: String,
    pub axis_label: String,
    /// Controlled dimension values shared by every cell of the table.
    pub fixed: BTreeMap<String, Value>,
    pub table: PivotTable,
    /// Benchmark class per cell, when the records carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<PivotTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitOutput>,
}

/// A request that produced no plot, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRequest {
    pub name: String,
    pub reason: String,
}

/// Metadata about one pivot run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    /// Data files the records were read from.
    pub sources: Vec<String>,
    pub records: usize,
    pub requests_run: usize,
    pub plots: usize,
    /// Requests that had nothing to plot.
    pub skipped: Vec<SkippedRequest>,
    pub duration_seconds: f64,
}

/// The complete pivot report handed to plotting tools.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub plots: Vec<PlotOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, Value)]) -> Record {
        fields.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn test_value_ordering() {
        assert!(Value::Absent < Value::Int(-5));
        assert!(Value::Int(3) < Value::Int(10));
        assert!(Value::Int(i64::MAX) < Value::text("a"));
        assert!(Value::text("C > Java") < Value::text("Java > C"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::text("int").to_string(), "int");
        assert_eq!(Value::Absent.to_string(), "-");
    }

    #[test]
    fn test_record_set_rejects_different_keys() {
        let a = record(&[("lineno", Value::Int(1)), ("size", Value::Int(1))]);
        let b = record(&[("lineno", Value::Int(2))]);

        match RecordSet::new(vec![a, b]) {
            Err(PivotError::SchemaMismatch {
                lineno,
                expected,
                actual,
            }) => {
                assert_eq!(lineno, 2);
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_without_keys_prefix_pattern() {
        let a = record(&[
            ("id", Value::text("A")),
            ("parameter_type_int_count", Value::Int(1)),
            ("parameter_type_count", Value::Int(1)),
        ]);
        let set = RecordSet::new(vec![a])
            .unwrap()
            .without_keys(&["parameter_type_*".to_string()]);

        assert_eq!(set.keys().len(), 1);
        assert!(set.has_key("id"));
        assert_eq!(set.records()[0].len(), 1);
    }

    #[test]
    fn test_select_keeps_keys() {
        let a = record(&[("size", Value::Int(1))]);
        let b = record(&[("size", Value::Int(2))]);
        let set = RecordSet::new(vec![a, b]).unwrap();

        let none = set.select(|_| false);
        assert!(none.is_empty());
        assert!(none.has_key("size"));

        let some = set.select(|r| r.int("size") == Some(2));
        assert_eq!(some.len(), 1);
    }

    #[test]
    fn test_cell_serialization() {
        let row = vec![Cell::Int(1), Cell::Null, Cell::Float(0.5), Cell::Text("x".into())];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[1,null,0.5,"x"]"#);
    }

    #[test]
    fn test_numeric_x() {
        let table = PivotTable {
            headers: vec!["size".into(), "a".into()],
            rows: vec![vec![Cell::Int(1), Cell::Int(5)], vec![Cell::Int(2), Cell::Null]],
        };
        assert_eq!(table.numeric_x(), Some(vec![1.0, 2.0]));

        let named = PivotTable {
            headers: vec!["id".into(), "a".into()],
            rows: vec![vec![Cell::Text("Foo".into()), Cell::Int(5)]],
        };
        assert_eq!(named.numeric_x(), None);
    }
}
