//! Measurement data file discovery and ingestion.
//!
//! This module finds benchmark data files under an input path, respecting
//! the configured file name prefix, extensions, excludes and size limit.

pub mod reader;

pub use reader::read_records;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for data file discovery.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File name prefix of data files (e.g. "benchmarks-")
    pub prefix: String,
    /// File extensions to include (e.g. ["json"])
    pub extensions: Vec<String>,
    /// Directory or file names to skip
    pub excludes: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            prefix: "benchmarks-".to_string(),
            extensions: vec!["json".to_string()],
            excludes: vec!["plots".to_string(), "perfdata".to_string()],
            max_file_size: 256 * 1024 * 1024,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

/// Finds data files under an input path.
pub struct DataFileScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl DataFileScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Scan for all matching data files, sorted by file name.
    ///
    /// A root that is itself a file is returned as-is, whatever its name.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        if !self.root.is_dir() {
            return Err(anyhow!("Input path not found: {}", self.root.display()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Cannot read directory entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }

        debug!("Found {} data files under {}", files.len(), self.root.display());
        Ok(files)
    }

    /// Check if a file matches scan criteria.
    pub fn matches(&self, path: &Path) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };
        if !name.starts_with(&self.config.prefix) {
            return false;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.config.extensions.iter().any(|e| e == ext) {
            return false;
        }

        match std::fs::metadata(path) {
            Ok(metadata) if metadata.len() > self.config.max_file_size => {
                warn!(
                    "Skipping {}: {} bytes exceeds the size limit",
                    path.display(),
                    metadata.len()
                );
                false
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_by_prefix_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("benchmarks-2.json"), "[]").unwrap();
        fs::write(dir.path().join("benchmarks-1.json"), "[]").unwrap();
        fs::write(dir.path().join("benchmarks-1.csv"), "").unwrap();
        fs::write(dir.path().join("measurements.json"), "[]").unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache/benchmarks-3.json"), "[]").unwrap();

        let scanner = DataFileScanner::new(dir.path().to_path_buf(), ScanConfig::default());
        let files = scanner.scan().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["benchmarks-1.json", "benchmarks-2.json"]);
    }

    #[test]
    fn test_scan_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, "[]").unwrap();

        let scanner = DataFileScanner::new(path.clone(), ScanConfig::default());
        assert_eq!(scanner.scan().unwrap(), vec![path]);
    }

    #[test]
    fn test_scan_missing_path() {
        let scanner = DataFileScanner::new(
            PathBuf::from("/nonexistent/benchpivot/input"),
            ScanConfig::default(),
        );
        assert!(scanner.scan().is_err());
    }

    #[test]
    fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("benchmarks-1.json"), "[{}, {}]").unwrap();

        let config = ScanConfig {
            max_file_size: 2,
            ..ScanConfig::default()
        };
        let scanner = DataFileScanner::new(dir.path().to_path_buf(), config);
        assert!(scanner.scan().unwrap().is_empty());
    }
}
