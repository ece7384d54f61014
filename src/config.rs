//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.benchpivot.toml` files.

use crate::analysis::fields::MULTIPLIER_FIELD;
use crate::analysis::request::Condition;
use crate::analysis::{PivotOptions, PlotRequest, RequestSettings};
use crate::preprocess::CampaignValues;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".benchpivot.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data file discovery settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Values that hold for the whole measurement campaign.
    #[serde(default)]
    pub campaign: CampaignConfig,

    /// Pivot and table settings.
    #[serde(default)]
    pub pivot: PivotConfig,

    /// Plot requests. The built-in set is used when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<PlotRequest>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "pivot_report.json".to_string()
}

/// Data file discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// File name prefix of data files.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory or file names to skip.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Maximum file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            extensions: default_extensions(),
            excludes: default_excludes(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_prefix() -> String {
    "benchmarks-".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_excludes() -> Vec<String> {
    vec!["plots", "perfdata"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    256 * 1024 * 1024 // 256MB
}

/// Campaign-wide values applied to every record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Declared replicate count (total retained rounds).
    #[serde(default)]
    pub multiplier: Option<i64>,

    /// Repetition count for records that carry none.
    #[serde(default)]
    pub repetitions: Option<i64>,
}

/// Pivot and table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotConfig {
    /// Minimum distinct variable values of a series.
    #[serde(default = "default_min_series_length")]
    pub min_series_length: usize,

    /// Minimum series of a plotted table.
    #[serde(default = "default_min_series_width")]
    pub min_series_width: usize,

    /// Report response times in seconds.
    #[serde(default)]
    pub convert_to_seconds: bool,

    /// Fit trend lines to numeric tables.
    #[serde(default = "default_true")]
    pub fit: bool,

    /// Axis label per variable field.
    #[serde(default = "default_axis_labels")]
    pub axis_labels: BTreeMap<String, String>,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            min_series_length: default_min_series_length(),
            min_series_width: default_min_series_width(),
            convert_to_seconds: false,
            fit: true,
            axis_labels: default_axis_labels(),
        }
    }
}

fn default_min_series_length() -> usize {
    2
}

fn default_min_series_width() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_axis_labels() -> BTreeMap<String, String> {
    [
        ("description", "workload"),
        ("parameter_count", "parameter count"),
        ("dynamic_size", "object size"),
        ("direction", "call direction"),
        ("id", "name"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// The standard plots of a native call benchmark campaign.
pub fn default_requests() -> Vec<PlotRequest> {
    let regular = || Condition::not_equals("no", -1i64);
    let custom = || Condition::equals("no", -1i64);

    vec![
        PlotRequest::new("overhead", "from", "description")
            .titled("Measuring overhead")
            .select(vec![custom(), Condition::contains("id", "Overhead")]),
        PlotRequest::new("basic-call", "direction", "parameter_count")
            .titled("Call parameters by type")
            .select(vec![regular(), Condition::equals("dynamic_size", 0i64)])
            .remove_keys(&[
                "parameter_type_*",
                "dynamic_size",
                "dynamic_variation",
                "has_reference_types",
            ]),
        PlotRequest::new("basic-call-all-types", "single_type", "parameter_count")
            .titled("Parameter types compared")
            .select(vec![regular()])
            .remove_keys(&["parameter_type_*", "dynamic_variation", "has_reference_types"]),
        PlotRequest::new("variable-argument-size", "single_type", "dynamic_size")
            .titled("Variable argument size")
            .select(vec![
                regular(),
                Condition::equals("has_reference_types", 1i64),
                Condition::equals("parameter_count", 1i64),
            ])
            .remove_keys(&["parameter_type_*"]),
        PlotRequest::new("variable-return-value-size", "return_type", "dynamic_size")
            .titled("Variable return value size")
            .select(vec![
                regular(),
                Condition::equals("has_reference_types", 1i64),
                Condition::not_equals("return_type", "void"),
            ])
            .remove_keys(&["parameter_type_*"]),
        PlotRequest::new("return-value-types", "return_type", "direction")
            .titled("Return value types")
            .select(vec![
                regular(),
                Condition::equals("dynamic_size", 0i64),
                Condition::not_equals("return_type", "void"),
            ])
            .remove_keys(&["has_reference_types", "dynamic_variation"])
            .min_series_width(2),
        PlotRequest::new("special-calls", "id", "dynamic_size")
            .titled("Special calls")
            .select(vec![
                custom(),
                Condition::equals("dynamic_variation", 1i64),
                Condition::not_contains("id", "Overhead"),
            ]),
        PlotRequest::new("special-calls-non-dynamic", "direction", "id")
            .titled("Special calls by call direction")
            .select(vec![
                custom(),
                Condition::equals("dynamic_variation", 0i64),
                Condition::contains("id", "Field"),
            ]),
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check value ranges and every configured request.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pivot.min_series_length == 0 {
            return Err("pivot.min_series_length must be at least 1".to_string());
        }
        if let Some(multiplier) = self.campaign.multiplier {
            if multiplier < 1 {
                return Err("campaign.multiplier must be at least 1".to_string());
            }
        }
        for request in &self.requests {
            request.validate()?;
        }
        let mut names: Vec<&str> = self.requests.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(format!("Duplicate plot request name: {}", pair[0]));
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if args.multiplier.is_some() {
            self.campaign.multiplier = args.multiplier;
        }
        if args.repetitions.is_some() {
            self.campaign.repetitions = args.repetitions;
        }

        if let Some(length) = args.min_series_length {
            self.pivot.min_series_length = length;
        }
        if let Some(width) = args.min_series_width {
            self.pivot.min_series_width = width;
        }

        // Flags always override
        if args.seconds {
            self.pivot.convert_to_seconds = true;
        }
        if args.no_fit {
            self.pivot.fit = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some((group, variable, measure)) = args.adhoc_request() {
            self.requests = vec![PlotRequest::new("adhoc", group, variable).measure(measure)];
        }
    }

    /// Configured requests, or the built-in set when none are configured,
    /// restricted to `only` when given.
    pub fn active_requests(&self, only: Option<&[String]>) -> Result<Vec<PlotRequest>> {
        let requests = if self.requests.is_empty() {
            default_requests()
        } else {
            self.requests.clone()
        };

        let Some(names) = only else {
            return Ok(requests);
        };

        for name in names {
            if !requests.iter().any(|r| &r.name == name) {
                let known: Vec<&str> = requests.iter().map(|r| r.name.as_str()).collect();
                return Err(anyhow!(
                    "Unknown plot request '{}' (known: {})",
                    name,
                    known.join(", ")
                ));
            }
        }
        Ok(requests
            .into_iter()
            .filter(|r| names.contains(&r.name))
            .collect())
    }

    /// Global values for preprocessing.
    pub fn campaign_values(&self) -> CampaignValues {
        CampaignValues {
            multiplier: self.campaign.multiplier,
            repetitions: self.campaign.repetitions,
        }
    }

    /// Settings shared by every request of a run.
    pub fn request_settings(&self) -> RequestSettings {
        RequestSettings {
            pivot: PivotOptions {
                min_series_length: self.pivot.min_series_length,
                min_series_width: self.pivot.min_series_width,
            },
            fit: self.pivot.fit,
            convert_to_seconds: self.pivot.convert_to_seconds,
            axis_labels: self.pivot.axis_labels.clone(),
        }
    }

    /// Generate a default configuration file content.
    ///
    /// Spells out the built-in requests so they can be edited.
    pub fn default_toml() -> String {
        let config = Config {
            requests: default_requests(),
            ..Config::default()
        };
        let body = toml::to_string_pretty(&config).unwrap_or_else(|_| String::new());
        format!(
            "# benchpivot configuration\n# Records need a '{}' field, or set campaign.multiplier.\n\n{}",
            MULTIPLIER_FIELD, body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "pivot_report.json");
        assert_eq!(config.scanner.prefix, "benchmarks-");
        assert_eq!(config.pivot.min_series_length, 2);
        assert_eq!(config.pivot.min_series_width, 1);
        assert!(config.pivot.fit);
        assert!(config.requests.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "tables.json"
verbose = true

[campaign]
multiplier = 3

[pivot]
convert_to_seconds = true

[[requests]]
name = "strings"
group = "id"
variable = "dynamic_size"

[[requests.select]]
field = "id"
contains = "String"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "tables.json");
        assert!(config.general.verbose);
        assert_eq!(config.campaign.multiplier, Some(3));
        assert!(config.pivot.convert_to_seconds);
        assert_eq!(config.pivot.min_series_length, 2);
        assert_eq!(config.requests.len(), 1);
        assert_eq!(config.requests[0].measure, "response_time");
        assert_eq!(config.requests[0].select, vec![Condition::contains("id", "String")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_condition() {
        let toml_content = r#"
[[requests]]
name = "broken"
group = "id"
variable = "dynamic_size"

[[requests.select]]
field = "id"
"#;
        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[pivot]\nfit = false\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.pivot.fit);

        std::fs::write(&path, "[pivot]\nmin_series_length = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::try_parse_from([
            "benchpivot",
            "--input",
            ".",
            "--multiplier",
            "2",
            "--seconds",
            "--no-fit",
            "--group",
            "direction",
            "--variable",
            "dynamic_size",
            "--measure",
            "response_time",
        ])
        .unwrap();

        let mut config = Config::default();
        config.campaign.repetitions = Some(10);
        config.merge_with_args(&args);

        assert_eq!(config.campaign.multiplier, Some(2));
        assert_eq!(config.campaign.repetitions, Some(10));
        assert!(config.pivot.convert_to_seconds);
        assert!(!config.pivot.fit);
        assert_eq!(config.requests.len(), 1);
        assert_eq!(config.requests[0].group, "direction");
    }

    #[test]
    fn test_active_requests() {
        let config = Config::default();
        let all = config.active_requests(None).unwrap();
        assert_eq!(all.len(), default_requests().len());

        let only = vec!["special-calls".to_string(), "overhead".to_string()];
        let some = config.active_requests(Some(&only)).unwrap();
        let names: Vec<_> = some.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["overhead", "special-calls"]);

        let unknown = vec!["nope".to_string()];
        assert!(config.active_requests(Some(&unknown)).is_err());
    }

    #[test]
    fn test_default_requests_are_valid() {
        for request in default_requests() {
            assert!(request.validate().is_ok(), "{}", request.name);
        }
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[pivot]"));
        assert!(toml_str.contains("[[requests]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.requests, default_requests());
    }
}
