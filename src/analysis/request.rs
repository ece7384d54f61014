//! Plot requests.
//!
//! A request picks the records to plot, names the group, variable and
//! measure fields, and turns every compatible set the pivot yields into
//! one numbered plot table.

use super::fit::{build_fitted_overlay, LeastSquares};
use super::pivot::{build_pivot, PivotOptions, TableOptions, RESPONSE_TIME};
use crate::error::Result;
use crate::models::{FitOutput, PlotOutput, Record, RecordSet, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A predicate on one record field.
///
/// Exactly one of the comparison fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_contains: Option<String>,
}

impl Condition {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            equals: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn not_equals(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            not_equals: Some(value.into()),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn one_of(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            one_of: Some(values),
            ..Default::default()
        }
    }

    pub fn contains(field: &str, needle: &str) -> Self {
        Self {
            field: field.to_string(),
            contains: Some(needle.to_string()),
            ..Default::default()
        }
    }

    pub fn not_contains(field: &str, needle: &str) -> Self {
        Self {
            field: field.to_string(),
            not_contains: Some(needle.to_string()),
            ..Default::default()
        }
    }

    /// Check that exactly one comparison is given.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let given = [
            self.equals.is_some(),
            self.not_equals.is_some(),
            self.one_of.is_some(),
            self.contains.is_some(),
            self.not_contains.is_some(),
        ]
        .iter()
        .filter(|g| **g)
        .count();

        if given != 1 {
            return Err(format!(
                "Condition on '{}' must set exactly one comparison, found {}",
                self.field, given
            ));
        }
        Ok(())
    }

    /// Whether `record` satisfies this condition.
    ///
    /// A missing or absent field only satisfies the negated comparisons.
    pub fn matches(&self, record: &Record) -> bool {
        let value = match record.get(&self.field) {
            Some(v) if !v.is_absent() => v,
            _ => return self.not_equals.is_some() || self.not_contains.is_some(),
        };

        if let Some(expected) = &self.equals {
            return value == expected;
        }
        if let Some(unexpected) = &self.not_equals {
            return value != unexpected;
        }
        if let Some(values) = &self.one_of {
            return values.contains(value);
        }
        if let Some(needle) = &self.contains {
            return value.to_string().contains(needle.as_str());
        }
        if let Some(needle) = &self.not_contains {
            return !value.to_string().contains(needle.as_str());
        }
        true
    }
}

fn default_measure() -> String {
    RESPONSE_TIME.to_string()
}

/// One configured plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotRequest {
    /// Identifier of the produced plots.
    pub name: String,

    #[serde(default)]
    pub title: String,

    /// One series per value of this field.
    pub group: String,

    /// The x axis.
    pub variable: String,

    #[serde(default = "default_measure")]
    pub measure: String,

    /// Conditions every plotted record satisfies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<Condition>,

    /// Fields dropped before grouping. A trailing `*` matches by prefix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_series_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_series_width: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<bool>,
}

impl PlotRequest {
    pub fn new(name: &str, group: &str, variable: &str) -> Self {
        Self {
            name: name.to_string(),
            title: String::new(),
            group: group.to_string(),
            variable: variable.to_string(),
            measure: default_measure(),
            select: Vec::new(),
            remove_keys: Vec::new(),
            min_series_length: None,
            min_series_width: None,
            fit: None,
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn measure(mut self, measure: &str) -> Self {
        self.measure = measure.to_string();
        self
    }

    pub fn select(mut self, conditions: Vec<Condition>) -> Self {
        self.select = conditions;
        self
    }

    pub fn remove_keys(mut self, keys: &[&str]) -> Self {
        self.remove_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn min_series_width(mut self, width: usize) -> Self {
        self.min_series_width = Some(width);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Plot request name must not be empty".to_string());
        }
        let roles = [&self.group, &self.variable, &self.measure];
        if roles.iter().any(|r| r.trim().is_empty()) {
            return Err(format!(
                "Plot request '{}' must name group, variable and measure",
                self.name
            ));
        }
        if self.group == self.variable || self.group == self.measure || self.variable == self.measure
        {
            return Err(format!(
                "Plot request '{}' uses one field in two roles",
                self.name
            ));
        }
        for condition in &self.select {
            condition
                .validate()
                .map_err(|e| format!("Plot request '{}': {}", self.name, e))?;
        }
        Ok(())
    }

    fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }
}

/// Run-wide settings shared by every request.
#[derive(Debug, Clone, Default)]
pub struct RequestSettings {
    pub pivot: PivotOptions,
    pub fit: bool,
    pub convert_to_seconds: bool,
    /// Axis label per variable field.
    pub axis_labels: BTreeMap<String, String>,
}

impl RequestSettings {
    pub fn axis_label<'a>(&'a self, variable: &'a str) -> &'a str {
        self.axis_labels
            .get(variable)
            .map(String::as_str)
            .unwrap_or(variable)
    }
}

/// Hands out consecutive page numbers for one run.
#[derive(Debug, Clone)]
pub struct PageCounter {
    next: usize,
}

impl PageCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_page(&mut self) -> usize {
        let page = self.next;
        self.next += 1;
        page
    }

    /// Number of pages handed out so far.
    pub fn issued(&self) -> usize {
        self.next - 1
    }
}

impl Default for PageCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// What a request produced.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Plotted(Vec<PlotOutput>),
    /// Nothing to plot. Not an error.
    Skipped { reason: String },
}

impl RequestOutcome {
    fn skipped(request: &PlotRequest, reason: String) -> Self {
        info!("Skipping {}: {}", request.name, reason);
        RequestOutcome::Skipped { reason }
    }
}

/// Run `request` against `records`.
pub fn run_request(
    records: &RecordSet,
    request: &PlotRequest,
    settings: &RequestSettings,
    pages: &mut PageCounter,
) -> Result<RequestOutcome> {
    let selected = records
        .select(|r| request.select.iter().all(|c| c.matches(r)))
        .without_keys(&request.remove_keys);
    debug!(
        "Request {} selected {} of {} records",
        request.name,
        selected.len(),
        records.len()
    );

    for field in [&request.group, &request.variable, &request.measure] {
        if !selected.has_key(field) {
            return Ok(RequestOutcome::skipped(
                request,
                format!("no field '{}' in the records", field),
            ));
        }
    }

    let distinct = selected.distinct_values(&request.variable).len();
    if distinct < 2 {
        return Ok(RequestOutcome::skipped(
            request,
            format!("{} distinct values of '{}'", distinct, request.variable),
        ));
    }

    let options = PivotOptions {
        min_series_length: request
            .min_series_length
            .unwrap_or(settings.pivot.min_series_length),
        min_series_width: request
            .min_series_width
            .unwrap_or(settings.pivot.min_series_width),
    };
    let pivot = build_pivot(
        &selected,
        &request.group,
        &request.variable,
        &request.measure,
        options,
    )?;
    if pivot.sets.is_empty() {
        return Ok(RequestOutcome::skipped(
            request,
            "no series long enough".to_string(),
        ));
    }

    let axis_label = settings.axis_label(&request.variable);
    let table_options = TableOptions {
        axis_label,
        convert_to_seconds: settings.convert_to_seconds,
    };
    let with_classes = selected.has_key("class");
    let fit = request.fit.unwrap_or(settings.fit);
    let multiple = pivot.sets.len() > 1;

    let mut plots = Vec::with_capacity(pivot.sets.len());
    for (index, set) in pivot.sets.iter().enumerate() {
        let identifier = if multiple {
            format!("{}-{}", request.name, index)
        } else {
            request.name.clone()
        };
        let page = pages.next_page();

        let table = set.table(&pivot.roles, &request.measure, table_options);
        let classes = with_classes.then(|| {
            set.table(
                &pivot.roles,
                "class",
                TableOptions {
                    convert_to_seconds: false,
                    ..table_options
                },
            )
        });

        let fit_output = if fit {
            build_fitted_overlay(&table, &LeastSquares).map(|fitted| FitOutput {
                page: pages.next_page(),
                identifier: format!("{}-fit", identifier),
                polynomials: fitted.polynomials,
                overlay: fitted.table,
            })
        } else {
            None
        };

        debug!("Plot {} on page {}", identifier, page);
        plots.push(PlotOutput {
            identifier,
            title: request.display_title().to_string(),
            page,
            group: request.group.clone(),
            variable: request.variable.clone(),
            measure: request.measure.clone(),
            axis_label: axis_label.to_string(),
            fixed: set.fixed.clone(),
            table,
            classes,
            fit: fit_output,
        });
    }

    Ok(RequestOutcome::Plotted(plots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn benchmark(lineno: i64, id: &str, direction: &str, size: i64, rt: i64) -> Record {
        [
            ("lineno", Value::Int(lineno)),
            ("id", Value::text(id)),
            ("class", Value::text(format!("{}Bench", id))),
            ("direction", Value::text(direction)),
            ("dynamic_size", Value::Int(size)),
            ("response_time", Value::Int(rt)),
            ("multiplier", Value::Int(1)),
        ]
        .into_iter()
        .collect()
    }

    fn records() -> RecordSet {
        RecordSet::new(vec![
            benchmark(1, "ReadUTF", "C > Java", 1, 100),
            benchmark(2, "ReadUTF", "C > Java", 2, 200),
            benchmark(3, "ReadUTF", "C > Java", 3, 300),
            benchmark(4, "ReadString", "C > Java", 1, 110),
            benchmark(5, "ReadString", "C > Java", 2, 210),
            benchmark(6, "ReadUTF", "Java > C", 1, 400),
            benchmark(7, "ReadUTF", "Java > C", 2, 500),
        ])
        .unwrap()
    }

    #[test]
    fn test_condition_matching() {
        let record = benchmark(1, "ReadUTF", "C > Java", 1, 100);

        assert!(Condition::equals("dynamic_size", 1i64).matches(&record));
        assert!(!Condition::equals("dynamic_size", 2i64).matches(&record));
        assert!(Condition::not_equals("id", "Foo").matches(&record));
        assert!(Condition::contains("id", "UTF").matches(&record));
        assert!(!Condition::not_contains("id", "UTF").matches(&record));
        assert!(Condition::one_of("direction", vec![Value::text("C > Java")]).matches(&record));

        assert!(!Condition::equals("missing", 1i64).matches(&record));
        assert!(Condition::not_equals("missing", 1i64).matches(&record));
        assert!(Condition::not_contains("missing", "x").matches(&record));
    }

    #[test]
    fn test_condition_validation() {
        assert!(Condition::equals("id", "x").validate().is_ok());

        let empty = Condition {
            field: "id".to_string(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let double = Condition {
            contains: Some("x".to_string()),
            ..Condition::equals("id", "x")
        };
        assert!(double.validate().is_err());
    }

    #[test]
    fn test_condition_from_toml() {
        let condition: Condition = toml::from_str(
            r#"
field = "dynamic_size"
equals = 0
"#,
        )
        .unwrap();
        assert_eq!(condition, Condition::equals("dynamic_size", 0i64));
    }

    #[test]
    fn test_request_validation() {
        assert!(PlotRequest::new("ok", "id", "dynamic_size").validate().is_ok());
        assert!(PlotRequest::new("", "id", "dynamic_size").validate().is_err());
        assert!(PlotRequest::new("same", "id", "id").validate().is_err());
    }

    #[test]
    fn test_run_request_pages_and_identifiers() {
        let request = PlotRequest::new("special", "id", "dynamic_size").titled("Special calls");
        let settings = RequestSettings {
            pivot: PivotOptions::default(),
            fit: false,
            ..Default::default()
        };
        let mut pages = PageCounter::new();

        let plots = match run_request(&records(), &request, &settings, &mut pages).unwrap() {
            RequestOutcome::Plotted(plots) => plots,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(plots.len(), 2);
        assert_eq!(plots[0].identifier, "special-0");
        assert_eq!(plots[1].identifier, "special-1");
        assert_eq!(plots[0].page, 1);
        assert_eq!(plots[1].page, 2);
        assert_eq!(plots[0].fixed.get("direction"), Some(&Value::text("C > Java")));
        assert_eq!(plots[0].table.headers, vec!["dynamic_size", "ReadString", "ReadUTF"]);
        assert_eq!(plots[1].table.headers, vec!["dynamic_size", "ReadUTF"]);
        assert_eq!(pages.issued(), 2);
    }

    #[test]
    fn test_run_request_class_table_and_fit() {
        let request = PlotRequest::new("utf", "id", "dynamic_size")
            .select(vec![Condition::equals("direction", "C > Java")]);
        let mut settings = RequestSettings {
            fit: true,
            ..Default::default()
        };
        settings.pivot = PivotOptions::default();
        settings
            .axis_labels
            .insert("dynamic_size".to_string(), "object size".to_string());
        let mut pages = PageCounter::new();
        pages.next_page();

        let plots = match run_request(&records(), &request, &settings, &mut pages).unwrap() {
            RequestOutcome::Plotted(plots) => plots,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(plots.len(), 1);
        let plot = &plots[0];
        assert_eq!(plot.identifier, "utf");
        assert_eq!(plot.title, "utf");
        assert_eq!(plot.page, 2);
        assert_eq!(plot.axis_label, "object size");

        let classes = plot.classes.as_ref().unwrap();
        assert_eq!(classes.rows[0][2], Cell::Text("ReadUTFBench".to_string()));
        assert_eq!(classes.rows[2][1], Cell::Null);

        let fit = plot.fit.as_ref().unwrap();
        assert_eq!(fit.page, 3);
        assert_eq!(fit.identifier, "utf-fit");
        assert_eq!(fit.polynomials.len(), 2);
        assert_eq!(fit.overlay.headers.len(), 5);
    }

    #[test]
    fn test_run_request_skips_single_value() {
        let request = PlotRequest::new("one", "id", "dynamic_size")
            .select(vec![Condition::equals("dynamic_size", 1i64)]);
        let mut pages = PageCounter::new();

        let outcome =
            run_request(&records(), &request, &RequestSettings::default(), &mut pages).unwrap();
        assert!(matches!(outcome, RequestOutcome::Skipped { .. }));
        assert_eq!(pages.issued(), 0);
    }

    #[test]
    fn test_run_request_skips_empty_selection_and_missing_fields() {
        let none = PlotRequest::new("none", "id", "dynamic_size")
            .select(vec![Condition::equals("id", "Nothing")]);
        let missing = PlotRequest::new("missing", "return_type", "dynamic_size");
        let mut pages = PageCounter::new();

        for request in [none, missing] {
            let outcome =
                run_request(&records(), &request, &RequestSettings::default(), &mut pages).unwrap();
            assert!(matches!(outcome, RequestOutcome::Skipped { .. }));
        }
    }

    #[test]
    fn test_run_request_remove_keys() {
        let request = PlotRequest::new("by-direction", "direction", "dynamic_size")
            .remove_keys(&["id", "class"])
            .select(vec![Condition::equals("id", "ReadUTF")]);
        let mut pages = PageCounter::new();

        let plots = match run_request(&records(), &request, &RequestSettings::default(), &mut pages)
            .unwrap()
        {
            RequestOutcome::Plotted(plots) => plots,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(plots.len(), 1);
        assert!(plots[0].classes.is_none());
        assert_eq!(
            plots[0].table.headers,
            vec!["dynamic_size", "C > Java", "Java > C"]
        );
    }
}
