//! Reads measurement records from JSON data files.
//!
//! Each file holds an array of flat objects, one per measurement row.
//! Cells are normalised the same way for every file: dash or blank strings
//! become absent, integer-looking strings become integers, `class` keeps
//! only its last dotted component and `start`/`end` timestamps stay raw.

use crate::error::{PivotError, Result};
use crate::models::{Record, RecordSet, Value};
use serde_json::Map;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type JsonValue = serde_json::Value;

/// Read and validate all records from `paths`, in order.
///
/// Records are numbered continuously across files via the `lineno` field.
/// Fields that never carry a value are dropped before the shared key set
/// is checked.
pub fn read_records(paths: &[PathBuf]) -> Result<RecordSet> {
    info!("Reading from {} files", paths.len());

    let mut records = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|source| PivotError::Io {
            path: path.clone(),
            source,
        })?;
        let first_lineno = records.len() as i64 + 1;
        let parsed = parse_records(&text, path, first_lineno)?;
        debug!("{}: {} records", path.display(), parsed.len());
        records.extend(parsed);
    }

    drop_empty_fields(&mut records);
    let set = RecordSet::new(records)?;

    info!("Read {} records", set.len());
    Ok(set)
}

/// Parse one file's contents. `first_lineno` numbers the first record.
pub fn parse_records(text: &str, path: &Path, first_lineno: i64) -> Result<Vec<Record>> {
    let rows: Vec<Map<String, JsonValue>> =
        serde_json::from_str(text).map_err(|source| PivotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let lineno = first_lineno + i as i64;
            let mut record = Record::new();
            for (key, cell) in row {
                let value = normalize(&key, cell, lineno)?;
                record.insert(key, value);
            }
            record.insert("lineno", lineno);
            Ok(record)
        })
        .collect()
}

/// Normalise one JSON cell into a record value.
pub fn normalize(key: &str, cell: JsonValue, lineno: i64) -> Result<Value> {
    match cell {
        JsonValue::Null => Ok(Value::Absent),
        JsonValue::Bool(b) => Ok(Value::Int(i64::from(b))),
        JsonValue::Number(n) => n.as_i64().map(Value::Int).ok_or_else(|| {
            PivotError::UnsupportedValue {
                field: key.to_string(),
                lineno,
                found: n.to_string(),
            }
        }),
        JsonValue::String(s) => Ok(normalize_text(key, s)),
        other => Err(PivotError::UnsupportedValue {
            field: key.to_string(),
            lineno,
            found: other.to_string(),
        }),
    }
}

fn normalize_text(key: &str, s: String) -> Value {
    match key {
        "start" | "end" => return Value::Text(s),
        "class" => {
            if let Some(last) = s.rsplit('.').next() {
                return Value::text(last);
            }
        }
        _ => {}
    }

    if s == "-" || s.trim().is_empty() {
        return Value::Absent;
    }
    if is_integer_token(&s) {
        if let Ok(n) = s.parse::<i64>() {
            return Value::Int(n);
        }
    }
    Value::Text(s)
}

fn is_integer_token(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn drop_empty_fields(records: &mut [Record]) {
    let mut all_keys = BTreeSet::new();
    let mut keys_with_values = BTreeSet::new();
    for record in records.iter() {
        for key in record.keys() {
            all_keys.insert(key.clone());
            if !record.value(key).is_absent() {
                keys_with_values.insert(key.clone());
            }
        }
    }

    let empty: Vec<_> = all_keys.difference(&keys_with_values).collect();
    if empty.is_empty() {
        return;
    }
    debug!("Dropping fields without values: {:?}", empty);
    for record in records.iter_mut() {
        for key in &empty {
            record.remove(key);
        }
    }
}
