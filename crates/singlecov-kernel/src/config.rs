//! Project configuration, read from `.singlecov.toml`.
//!
//! ```toml
//! root = "."
//! branches = true
//! untested = ["lib/legacy.rb"]
//!
//! [[rewrite]]
//! pattern = "^lib/generators/"
//! replacement = "lib/"
//!
//! [report]
//! path = "coverage/.resultset.json"
//! lines_only = false
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use crate::audit::MAX_OUTPUT;
use crate::diff::{DEFAULT_UNCOVERED_MARKER, DiffEngine};
use crate::error::ResolveError;
use crate::report::ReportOptions;
use crate::resolver::{DEFAULT_APP_FOLDERS, DEFAULT_EXTENSION, RegexRewriter, Resolver};
use crate::usage::{DEFAULT_DECLARATION_PATTERN, UsageError, UsageScanner};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = ".singlecov.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid uncovered_marker {pattern:?}: {source}")]
    InvalidMarker {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// One ordered `{pattern, replacement}` substitution for resolved paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SingleCovConfig {
    /// Project root, relative to the config file's directory.
    pub root: Option<PathBuf>,
    pub branches: bool,
    pub extension: String,
    pub app_folders: Vec<String>,
    pub rewrite: Vec<RewriteRule>,
    /// Production files known to lack a test.
    pub untested: Vec<String>,
    /// Tests known to declare full coverage.
    pub complete: Vec<String>,
    pub production_globs: Vec<String>,
    pub test_roots: Vec<String>,
    pub uncovered_marker: String,
    pub max_output: usize,
    pub report: Option<ReportOptions>,
    pub declaration_pattern: String,
}

impl Default for SingleCovConfig {
    fn default() -> Self {
        Self {
            root: None,
            branches: true,
            extension: DEFAULT_EXTENSION.to_string(),
            app_folders: DEFAULT_APP_FOLDERS.iter().map(|s| s.to_string()).collect(),
            rewrite: Vec::new(),
            untested: Vec::new(),
            complete: Vec::new(),
            production_globs: vec!["app".to_string(), "lib".to_string()],
            test_roots: vec!["test".to_string(), "spec".to_string()],
            uncovered_marker: DEFAULT_UNCOVERED_MARKER.to_string(),
            max_output: MAX_OUTPUT,
            report: None,
            declaration_pattern: DEFAULT_DECLARATION_PATTERN.to_string(),
        }
    }
}

impl SingleCovConfig {
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text, &path.display().to_string())?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load `dir/.singlecov.toml` when present, defaults otherwise.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// The project root, with a relative `root` taken against `base`.
    pub fn project_root(&self, base: &Path) -> PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => base.join(root),
            None => base.to_path_buf(),
        }
    }

    /// Resolver for `root`; relative caller paths are taken against it.
    pub fn resolver(&self, root: impl Into<PathBuf>) -> Result<Resolver, ConfigError> {
        let root = root.into();
        let mut builder = Resolver::builder(&root)
            .working_dir(&root)
            .extension(self.extension.as_str())
            .app_folders(self.app_folders.iter().cloned());
        if !self.rewrite.is_empty() {
            let rules = self
                .rewrite
                .iter()
                .map(|rule| (rule.pattern.as_str(), rule.replacement.as_str()));
            builder = builder.rewriter(RegexRewriter::new(rules)?);
        }
        Ok(builder.build()?)
    }

    pub fn diff_engine(&self) -> Result<DiffEngine, ConfigError> {
        let engine = DiffEngine::with_marker(&self.uncovered_marker).map_err(|source| {
            ConfigError::InvalidMarker {
                pattern: self.uncovered_marker.clone(),
                source,
            }
        })?;
        Ok(engine.with_branches(self.branches))
    }

    pub fn usage_scanner(&self, root: impl Into<PathBuf>) -> Result<UsageScanner, ConfigError> {
        Ok(UsageScanner::with_pattern(root, &self.declaration_pattern)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = SingleCovConfig::from_toml_str("", "inline").expect("parses");
        assert_eq!(config, SingleCovConfig::default());
        assert!(config.branches);
        assert_eq!(config.extension, "rb");
        assert_eq!(config.max_output, 40);
        assert_eq!(config.production_globs, vec!["app", "lib"]);
    }

    #[test]
    fn full_config_parses() {
        let text = r##"
root = "project"
branches = false
untested = ["lib/legacy.rb"]
complete = ["test/a_test.rb"]
uncovered_marker = "# nocov"

[[rewrite]]
pattern = "^lib/generators/"
replacement = "lib/"

[report]
path = "coverage/out.json"
lines_only = true
"##;
        let config = SingleCovConfig::from_toml_str(text, "inline").expect("parses");
        assert!(!config.branches);
        assert_eq!(config.untested, vec!["lib/legacy.rb"]);
        assert_eq!(config.uncovered_marker, "# nocov");
        assert_eq!(config.rewrite.len(), 1);
        let report = config.report.as_ref().expect("report section");
        assert!(report.lines_only);
        assert_eq!(report.suite, "Minitest");
        assert_eq!(config.project_root(Path::new("/work")), PathBuf::from("/work/project"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SingleCovConfig::from_toml_str("brnaches = true\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn rewrite_rules_reach_the_resolver() {
        let config = SingleCovConfig::from_toml_str(
            "[[rewrite]]\npattern = \"^lib/\"\nreplacement = \"src/\"\n",
            "inline",
        )
        .expect("parses");
        let resolver = config.resolver("/repo").expect("resolver");
        assert_eq!(resolver.guess("/repo/test/a_test.rb"), Ok("src/a.rb".to_string()));
        assert_eq!(resolver.guess("test/b_test.rb"), Ok("src/b.rb".to_string()));
    }

    #[test]
    fn invalid_patterns_are_config_errors() {
        let mut config = SingleCovConfig::default();
        config.uncovered_marker = "(".to_string();
        assert!(matches!(config.diff_engine(), Err(ConfigError::InvalidMarker { .. })));

        let mut config = SingleCovConfig::default();
        config.rewrite.push(RewriteRule {
            pattern: "[".to_string(),
            replacement: String::new(),
        });
        assert!(matches!(
            config.resolver("/repo"),
            Err(ConfigError::Resolve(ResolveError::InvalidPattern { .. }))
        ));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SingleCovConfig::discover(dir.path()).expect("defaults");
        assert_eq!(config, SingleCovConfig::default());

        fs::write(dir.path().join(CONFIG_FILE_NAME), "max_output = 5\n").expect("write");
        let config = SingleCovConfig::discover(dir.path()).expect("loaded");
        assert_eq!(config.max_output, 5);
    }
}
