//! Coverage report artifact for downstream tools.
//!
//! ```json
//! {"Minitest": {"coverage": {"/abs/lib/a.rb": {...}}, "timestamp": 1700000000}}
//! ```
//!
//! Only declared files are included.

use crate::coverage::{CoverageResult, RawFileCoverage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level key; SimpleCov-compatible consumers expect this suite name.
pub const DEFAULT_SUITE: &str = "Minitest";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to create report directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render report: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportOptions {
    pub path: PathBuf,
    /// Collapse structured records to bare line arrays.
    #[serde(default)]
    pub lines_only: bool,
    #[serde(default = "default_suite")]
    pub suite: String,
}

fn default_suite() -> String {
    DEFAULT_SUITE.to_string()
}

impl ReportOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines_only: false,
            suite: default_suite(),
        }
    }
}

/// Build the report document for the given declared absolute paths.
pub fn build_report(
    options: &ReportOptions,
    coverage: &CoverageResult,
    declared: &BTreeSet<String>,
    timestamp: i64,
) -> Value {
    let covered: BTreeMap<&str, RawFileCoverage> = coverage
        .0
        .iter()
        .filter(|(path, _)| declared.contains(*path))
        .map(|(path, record)| {
            let record = if options.lines_only {
                record.to_lines_only()
            } else {
                record.clone()
            };
            (path.as_str(), record)
        })
        .collect();

    let mut document = Map::new();
    document.insert(
        options.suite.clone(),
        json!({
            "coverage": covered,
            "timestamp": timestamp,
        }),
    );
    Value::Object(document)
}

/// Write the report, creating parent directories and replacing any
/// existing file.
pub fn write_report(
    options: &ReportOptions,
    coverage: &CoverageResult,
    declared: &BTreeSet<String>,
    timestamp: i64,
) -> Result<PathBuf, ReportError> {
    let document = build_report(options, coverage, declared, timestamp);
    let rendered = serde_json::to_string_pretty(&document)?;
    let path = options.path.as_path();
    ensure_parent(path)?;
    fs::write(path, rendered).map_err(|source| ReportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), files = declared.len(), "wrote coverage report");
    Ok(path.to_path_buf())
}

fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ReportError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
