//! Derived and campaign-wide values added to every measurement record.
//!
//! Runs once after ingestion. Each step adds a field to all records or to
//! none, so the shared key set of the [`RecordSet`] survives.

use crate::error::Result;
use crate::models::{Record, RecordSet, Value};
use tracing::debug;

/// Values that hold for a whole measurement campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignValues {
    /// Declared replicate count: total retained rounds across the campaign.
    pub multiplier: Option<i64>,
    pub repetitions: Option<i64>,
}

/// Legacy names of custom benchmarks and their current JNI function names.
const RENAMED_BENCHMARKS: &[(&str, &str)] = &[
    ("CopyUnicode", "GetStringRegion"),
    ("CopyUTF", "GetStringRegionUTF"),
    ("StringLength", "GetStringLength"),
    ("StringLengthUTF", "GetStringUTFLength"),
    ("ReadUnicode", "ReadString"),
    ("ReadUnicodeCritical", "ReadStringCritical"),
    ("ReadUTF", "ReadStringUTF"),
    ("ReadUtf", "ReadStringUTF"),
    ("ReadObjectArrayElement", "GetObjectArrayElement"),
    ("WriteObjectArrayElement", "SetObjectArrayElement"),
];

/// Apply derived and global values to `records`.
pub fn preprocess(records: RecordSet, campaign: &CampaignValues) -> Result<RecordSet> {
    let records = if records.has_key("repetitions") {
        let before = records.len();
        let kept = records.select(|r| !r.value("repetitions").is_absent());
        debug!(
            "Dropped {} records without repetitions",
            before - kept.len()
        );
        kept
    } else {
        records
    };

    let keys = DerivedKeys {
        response_time_millis: records.has_key("response_time_millis"),
        parameter_count: records.has_key("parameter_count"),
        direction: records.has_key("from") && records.has_key("to"),
        id: records.has_key("id"),
    };

    records.try_map(|record| {
        add_derived_values(record, &keys);
        add_global_values(record, campaign);
    })
}

/// Which derived fields the current key set supports.
struct DerivedKeys {
    response_time_millis: bool,
    parameter_count: bool,
    direction: bool,
    id: bool,
}

fn add_derived_values(record: &mut Record, keys: &DerivedKeys) {
    if keys.response_time_millis {
        migrate_response_time_millis(record);
    }

    // Ingestion drops a column that is empty everywhere, so a missing
    // `dynamic_size` means no benchmark varied its size.
    if record.value("dynamic_size").is_absent() {
        record.insert("dynamic_variation", 0i64);
        record.insert("dynamic_size", 0i64);
    } else {
        record.insert("dynamic_variation", 1i64);
    }

    if keys.id && record.int("no") == Some(-1) {
        let renamed = record
            .str("id")
            .and_then(|id| RENAMED_BENCHMARKS.iter().find(|(old, _)| *old == id))
            .map(|(_, new)| *new);
        if let Some(new) = renamed {
            record.insert("id", new);
        }
    }

    if keys.parameter_count {
        let single_type = single_type(record);
        record.insert("single_type", single_type);
    }

    if keys.direction {
        let direction = format_direction(record.value("from"), record.value("to"));
        record.insert("direction", direction.as_str());
    }

    if keys.id {
        let nio = record.str("id").is_some_and(|id| id.contains("Nio"));
        record.insert("nio", i64::from(nio));
    }
}

/// Older data files store the measure as `response_time_millis`.
fn migrate_response_time_millis(record: &mut Record) {
    match record.remove("response_time_millis") {
        Some(millis) if !millis.is_absent() => {
            record.insert("response_time", millis);
            record.insert("time_unit", "milliseconds");
        }
        _ => {
            for key in ["response_time", "time_unit"] {
                if record.get(key).is_none() {
                    record.insert(key, Value::Absent);
                }
            }
        }
    }
}

/// The one parameter type used by a benchmark, if it uses only one.
fn single_type(record: &Record) -> Value {
    if record.int("parameter_count") == Some(0) {
        return Value::text("any");
    }
    if record.int("parameter_type_count") != Some(1) {
        return Value::Absent;
    }
    record
        .keys()
        .filter(|k| !record.value(k).is_absent())
        .find_map(|k| {
            k.strip_prefix("parameter_type_")
                .and_then(|rest| rest.strip_suffix("_count"))
                .filter(|t| !t.is_empty())
        })
        .map(Value::text)
        .unwrap_or_default()
}

/// "C > Java" style label for a call direction.
pub fn format_direction(from: &Value, to: &Value) -> String {
    let name = |v: &Value| match v.as_str() {
        Some("J") => "Java".to_string(),
        _ => v.to_string(),
    };
    format!("{} > {}", name(from), name(to))
}

fn add_global_values(record: &mut Record, campaign: &CampaignValues) {
    if let Some(multiplier) = campaign.multiplier {
        match record.int("multiplier") {
            Some(own) => record.insert("multiplier", own * multiplier),
            None => record.insert("multiplier", multiplier),
        }
    }
    if let Some(repetitions) = campaign.repetitions {
        if record.value("repetitions").is_absent() {
            record.insert("repetitions", repetitions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{run_request, PageCounter, RequestOutcome};

    fn benchmark(extra: &[(&str, Value)]) -> Record {
        let mut record: Record = [
            ("no", Value::Int(3)),
            ("id", Value::text("Call")),
            ("from", Value::text("C")),
            ("to", Value::text("J")),
            ("parameter_count", Value::Int(1)),
            ("parameter_type_count", Value::Int(1)),
            ("parameter_type_int_count", Value::Absent),
            ("parameter_type_long_count", Value::Int(1)),
            ("dynamic_size", Value::Absent),
        ]
        .into_iter()
        .collect();
        for (k, v) in extra {
            record.insert(*k, v.clone());
        }
        record
    }

    #[test]
    fn test_derived_values() {
        let set = RecordSet::new(vec![benchmark(&[])]).unwrap();
        let set = preprocess(set, &CampaignValues::default()).unwrap();
        let record = &set.records()[0];

        assert_eq!(record.value("direction"), &Value::text("C > Java"));
        assert_eq!(record.int("dynamic_size"), Some(0));
        assert_eq!(record.int("dynamic_variation"), Some(0));
        assert_eq!(record.value("single_type"), &Value::text("long"));
        assert_eq!(record.int("nio"), Some(0));
    }

    #[test]
    fn test_single_type_any_and_mixed() {
        let none = benchmark(&[("parameter_count", Value::Int(0))]);
        assert_eq!(single_type(&none), Value::text("any"));

        let mixed = benchmark(&[("parameter_type_count", Value::Int(2))]);
        assert_eq!(single_type(&mixed), Value::Absent);
    }

    #[test]
    fn test_custom_benchmark_rename() {
        let custom = benchmark(&[("no", Value::Int(-1)), ("id", Value::text("CopyUTF"))]);
        let regular = benchmark(&[("id", Value::text("CopyUTF"))]);
        let set = RecordSet::new(vec![custom, regular]).unwrap();
        let set = preprocess(set, &CampaignValues::default()).unwrap();

        assert_eq!(set.records()[0].str("id"), Some("GetStringRegionUTF"));
        assert_eq!(set.records()[1].str("id"), Some("CopyUTF"));
    }

    #[test]
    fn test_global_multiplier() {
        let own = benchmark(&[("multiplier", Value::Int(2))]);
        let missing = benchmark(&[("multiplier", Value::Absent)]);
        let set = RecordSet::new(vec![own, missing]).unwrap();
        let campaign = CampaignValues {
            multiplier: Some(3),
            repetitions: None,
        };
        let set = preprocess(set, &campaign).unwrap();

        assert_eq!(set.records()[0].int("multiplier"), Some(6));
        assert_eq!(set.records()[1].int("multiplier"), Some(3));
    }

    #[test]
    fn test_drops_records_without_repetitions() {
        let kept = benchmark(&[("repetitions", Value::Int(1000))]);
        let dropped = benchmark(&[("repetitions", Value::Absent)]);
        let set = RecordSet::new(vec![kept, dropped]).unwrap();
        let set = preprocess(set, &CampaignValues::default()).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.records()[0].int("repetitions"), Some(1000));
    }

    #[test]
    fn test_dynamic_values_without_dynamic_column() {
        let mut record = benchmark(&[]);
        record.remove("dynamic_size");
        let set = RecordSet::new(vec![record]).unwrap();
        let set = preprocess(set, &CampaignValues::default()).unwrap();

        assert_eq!(set.records()[0].int("dynamic_size"), Some(0));
        assert_eq!(set.records()[0].int("dynamic_variation"), Some(0));
    }

    #[test]
    fn test_dynamic_variation_of_sized_benchmarks() {
        let sized = benchmark(&[("dynamic_size", Value::Int(64))]);
        let fixed = benchmark(&[]);
        let set = RecordSet::new(vec![sized, fixed]).unwrap();
        let set = preprocess(set, &CampaignValues::default()).unwrap();

        assert_eq!(set.records()[0].int("dynamic_size"), Some(64));
        assert_eq!(set.records()[0].int("dynamic_variation"), Some(1));
        assert_eq!(set.records()[1].int("dynamic_variation"), Some(0));
    }

    #[test]
    fn test_response_time_millis_migration() {
        let legacy = benchmark(&[
            ("response_time_millis", Value::Int(12)),
            ("response_time", Value::Absent),
        ]);
        let current = benchmark(&[
            ("response_time_millis", Value::Absent),
            ("response_time", Value::Int(900)),
        ]);
        let set = RecordSet::new(vec![legacy, current]).unwrap();
        let set = preprocess(set, &CampaignValues::default()).unwrap();

        assert!(!set.has_key("response_time_millis"));
        assert_eq!(set.records()[0].int("response_time"), Some(12));
        assert_eq!(set.records()[0].str("time_unit"), Some("milliseconds"));
        assert_eq!(set.records()[1].int("response_time"), Some(900));
        assert!(set.records()[1].value("time_unit").is_absent());
    }

    #[test]
    fn test_basic_call_plots_without_dynamic_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchmarks-1.json");
        let rows: Vec<serde_json::Value> = [("C", "J"), ("J", "C")]
            .iter()
            .flat_map(|(from, to)| {
                (1..=2).map(move |count| {
                    serde_json::json!({
                        "no": 3 + count,
                        "id": format!("Call{}", count),
                        "from": from,
                        "to": to,
                        "parameter_count": count,
                        "parameter_type_count": 1,
                        "parameter_type_int_count": count,
                        "response_time": 100 + 10 * count,
                        "dynamic_size": "-",
                    })
                })
            })
            .collect();
        std::fs::write(&path, serde_json::to_string(&rows).unwrap()).unwrap();

        let records = crate::ingest::read_records(&[path]).unwrap();
        assert!(!records.has_key("dynamic_size"));

        let campaign = CampaignValues {
            multiplier: Some(1),
            repetitions: None,
        };
        let records = preprocess(records, &campaign).unwrap();
        assert!(records.has_key("dynamic_size"));

        let request = crate::config::default_requests()
            .into_iter()
            .find(|r| r.name == "basic-call")
            .unwrap();
        let settings = crate::config::Config::default().request_settings();
        let outcome = run_request(&records, &request, &settings, &mut PageCounter::new()).unwrap();

        match outcome {
            RequestOutcome::Plotted(plots) => {
                assert_eq!(plots.len(), 1);
                assert_eq!(plots[0].table.rows.len(), 2);
                assert_eq!(plots[0].table.headers.len(), 3);
            }
            other => panic!("basic-call was not plotted: {:?}", other),
        }
    }
}
