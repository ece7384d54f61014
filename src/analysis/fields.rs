//! Field roles for one pivot request.
//!
//! A record has no intrinsic roles. Per request the caller names the group,
//! variable and measure fields; the classifier then decides which of the
//! remaining fields are metadata (`info`) and which are controlled
//! dimensions identifying "the same benchmark".

use crate::error::{PivotError, Result};
use crate::models::{Record, Value};
use std::collections::BTreeSet;

/// Metadata fields that never take part in grouping.
const BASE_INFO: &[&str] = &["no", "from", "to", "lineno", "start", "end"];

/// Fields carrying the declared replicate count.
pub const MULTIPLIER_FIELD: &str = "multiplier";

/// Roles of every field in a record set, for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRoles {
    pub group: String,
    pub variable: String,
    pub measure: String,
    /// Metadata carried through aggregation, in sort order.
    pub info: Vec<String>,
    /// Every other field, in sort order.
    pub controlled: Vec<String>,
}

impl FieldRoles {
    /// Classify `keys` for a request pivoting `measure` over `variable`,
    /// one column per `group` value.
    pub fn classify(keys: &BTreeSet<String>, group: &str, variable: &str, measure: &str) -> Result<Self> {
        for field in [group, variable, measure] {
            if !keys.contains(field) {
                return Err(PivotError::MissingField {
                    field: field.to_string(),
                    lineno: None,
                });
            }
        }

        let mut info: Vec<&str> = BASE_INFO.to_vec();
        info.extend(["class", "description"]);
        if is_type_count_field(variable) {
            info.push("parameter_count");
        }
        if variable != "id" {
            info.push("id");
        }
        let info: Vec<String> = info
            .into_iter()
            .filter(|k| keys.contains(*k))
            .map(String::from)
            .collect();

        let controlled = keys
            .iter()
            .filter(|k| {
                let k = k.as_str();
                k != group && k != variable && k != measure && !info.iter().any(|i| i == k)
            })
            .cloned()
            .collect();

        Ok(Self {
            group: group.to_string(),
            variable: variable.to_string(),
            measure: measure.to_string(),
            info,
            controlled,
        })
    }

    /// Keys for the total order: controlled first, info last.
    pub fn sort_keys(&self) -> Vec<&str> {
        self.controlled
            .iter()
            .map(String::as_str)
            .chain([self.group.as_str(), self.variable.as_str(), self.measure.as_str()])
            .chain(self.info.iter().map(String::as_str))
            .collect()
    }

    /// View `record` through these roles.
    pub fn project(&self, record: &Record) -> Result<Measurement> {
        let lineno = record.lineno().unwrap_or(0);
        let multiplier = match record.value(MULTIPLIER_FIELD) {
            Value::Int(n) if *n > 0 => *n,
            Value::Absent => {
                return Err(PivotError::MissingField {
                    field: MULTIPLIER_FIELD.to_string(),
                    lineno: Some(lineno),
                })
            }
            other => {
                return Err(PivotError::InvalidMultiplier {
                    lineno,
                    value: other.to_string(),
                })
            }
        };

        Ok(Measurement {
            controlled: self.controlled.iter().map(|k| record.value(k).clone()).collect(),
            group: record.value(&self.group).clone(),
            variable: record.value(&self.variable).clone(),
            measure: record.value(&self.measure).clone(),
            info: self.info.iter().map(|k| record.value(k).clone()).collect(),
            multiplier,
            lineno,
        })
    }
}

/// `parameter_type_<t>_count` style fields.
fn is_type_count_field(name: &str) -> bool {
    name.strip_prefix("parameter_type_")
        .is_some_and(|rest| rest.len() > "count".len() && rest.ends_with("count"))
}

/// One record with its fields split by role.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Values of [`FieldRoles::controlled`], same order.
    pub controlled: Vec<Value>,
    pub group: Value,
    pub variable: Value,
    pub measure: Value,
    /// Values of [`FieldRoles::info`], same order.
    pub info: Vec<Value>,
    pub multiplier: i64,
    pub lineno: i64,
}
