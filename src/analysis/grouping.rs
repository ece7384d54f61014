//! Total ordering of records and hierarchical grouping into runs.
//!
//! Records are sorted with [`compare_by_keys`] so that every record of one
//! (controlled, group, variable) cell ends up adjacent, then split by
//! [`group_runs`] three times into a [`ControlledGroup`] tree.

use super::fields::Measurement;
use crate::models::{Record, Value};
use std::cmp::Ordering;

/// Compare two records lexicographically over `keys`.
///
/// A key absent from both records is skipped. A key present on only one
/// side orders the record lacking it first.
pub fn compare_by_keys(keys: &[&str], left: &Record, right: &Record) -> Ordering {
    for key in keys {
        let ordering = match (left.get(key), right.get(key)) {
            (None, None) => continue,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(l), Some(r)) => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Split `items` into maximal runs of consecutive items with equal keys.
///
/// Concatenating the runs gives back `items` in order.
pub fn group_runs<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Vec<Vec<T>>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut runs: Vec<Vec<T>> = Vec::new();
    let mut current_key: Option<K> = None;

    for item in items {
        let k = key(&item);
        if current_key.as_ref() == Some(&k) {
            if let Some(run) = runs.last_mut() {
                run.push(item);
                continue;
            }
        }
        runs.push(vec![item]);
        current_key = Some(k);
    }

    runs
}

/// Measurements sharing every controlled dimension value.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlledGroup {
    pub controlled: Vec<Value>,
    pub series: Vec<SeriesGroup>,
}

/// Measurements of one controlled group sharing a group value.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesGroup {
    pub group: Value,
    pub cells: Vec<ReplicateCell>,
}

/// Replicate measurements of one (controlled, group, variable) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateCell {
    pub variable: Value,
    /// Never empty.
    pub replicates: Vec<Measurement>,
}

/// Build the three-level grouping tree from measurements already sorted
/// by controlled values, group and variable.
pub fn build_tree(sorted: Vec<Measurement>) -> Vec<ControlledGroup> {
    group_runs(sorted, |m| m.controlled.clone())
        .into_iter()
        .map(|run| ControlledGroup {
            controlled: run[0].controlled.clone(),
            series: group_runs(run, |m| m.group.clone())
                .into_iter()
                .map(|run| SeriesGroup {
                    group: run[0].group.clone(),
                    cells: group_runs(run, |m| m.variable.clone())
                        .into_iter()
                        .map(|replicates| ReplicateCell {
                            variable: replicates[0].variable.clone(),
                            replicates,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}
