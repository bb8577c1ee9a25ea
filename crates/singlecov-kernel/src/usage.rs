//! Source scans over test files: does each one declare coverage, and does
//! the list of fully covered tests still match what they declare.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Matches either declaration call.
pub const DEFAULT_DECLARATION_PATTERN: &str = r"SingleCov\.(?:not_)?covered!";

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("invalid declaration pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read test file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", suffixed(.tests, "needs to declare coverage"))]
    Undeclared { tests: Vec<String> },

    #[error("{}", full_coverage_lines(.unlisted, .stale))]
    FullCoverageMismatch {
        /// Fully covered, but not in the complete list.
        unlisted: Vec<String>,
        /// In the complete list, but declaring uncovered locations.
        stale: Vec<String>,
    },
}

fn suffixed(tests: &[String], message: &str) -> String {
    tests
        .iter()
        .map(|test| format!("{test}: {message}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn full_coverage_lines(unlisted: &[String], stale: &[String]) -> String {
    let mut lines = Vec::new();
    if !unlisted.is_empty() {
        lines.push(suffixed(unlisted, "declares full coverage, add it to the complete list"));
    }
    if !stale.is_empty() {
        lines.push(suffixed(stale, "declares uncovered locations, remove it from the complete list"));
    }
    lines.join("\n")
}

fn excluded_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SingleCov\.not_covered!").expect("excluded regex must compile"))
}

/// A non-zero `uncovered:` count before any comment on its line.
fn uncovered_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[^#\n]*uncovered:\s*[1-9]").expect("uncovered count regex must compile")
    })
}

/// What a test file's source says about its declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Missing,
    Excluded,
    Full,
    Partial,
}

pub struct UsageScanner {
    root: PathBuf,
    declaration: Regex,
}

impl UsageScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            declaration: Regex::new(DEFAULT_DECLARATION_PATTERN)
                .expect("default declaration regex must compile"),
        }
    }

    pub fn with_pattern(root: impl Into<PathBuf>, pattern: &str) -> Result<Self, UsageError> {
        let declaration = Regex::new(pattern).map_err(|source| UsageError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            root: root.into(),
            declaration,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classify(&self, text: &str) -> DeclarationKind {
        if !self.declaration.is_match(text) {
            DeclarationKind::Missing
        } else if excluded_re().is_match(text) {
            DeclarationKind::Excluded
        } else if uncovered_count_re().is_match(text) {
            DeclarationKind::Partial
        } else {
            DeclarationKind::Full
        }
    }

    fn read(&self, test: &str) -> Result<String, UsageError> {
        fs::read_to_string(self.root.join(test)).map_err(|source| UsageError::Read {
            path: test.to_string(),
            source,
        })
    }

    /// Every test must declare coverage, covered or excluded.
    pub fn check_used(&self, tests: &[String]) -> Result<(), UsageError> {
        let mut undeclared = Vec::new();
        for test in tests {
            if self.classify(&self.read(test)?) == DeclarationKind::Missing {
                undeclared.push(test.clone());
            }
        }
        if undeclared.is_empty() {
            debug!(tests = tests.len(), "every test declares coverage");
            Ok(())
        } else {
            Err(UsageError::Undeclared { tests: undeclared })
        }
    }

    /// The `complete` list must name exactly the tests declaring full coverage.
    pub fn check_full_coverage(&self, tests: &[String], complete: &[String]) -> Result<(), UsageError> {
        let mut unlisted = Vec::new();
        let mut stale = Vec::new();
        for test in tests {
            let listed = complete.contains(test);
            match self.classify(&self.read(test)?) {
                DeclarationKind::Full if !listed => unlisted.push(test.clone()),
                DeclarationKind::Partial if listed => stale.push(test.clone()),
                _ => {}
            }
        }
        if unlisted.is_empty() && stale.is_empty() {
            Ok(())
        } else {
            Err(UsageError::FullCoverageMismatch { unlisted, stale })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (file, text) in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, text).expect("write");
        }
        dir
    }

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classifies_declarations() {
        let scanner = UsageScanner::new("/repo");
        assert_eq!(scanner.classify("require 'x'\n"), DeclarationKind::Missing);
        assert_eq!(scanner.classify("SingleCov.not_covered!\n"), DeclarationKind::Excluded);
        assert_eq!(scanner.classify("SingleCov.covered!\n"), DeclarationKind::Full);
        assert_eq!(scanner.classify("SingleCov.covered! uncovered: 0\n"), DeclarationKind::Full);
        assert_eq!(scanner.classify("SingleCov.covered! uncovered: 3\n"), DeclarationKind::Partial);
        assert_eq!(
            scanner.classify("SingleCov.covered! # uncovered: 3 once flaky\n"),
            DeclarationKind::Full
        );
    }

    #[test]
    fn undeclared_tests_are_listed() {
        let dir = project(&[
            ("test/a_test.rb", "SingleCov.covered!\n"),
            ("test/b_test.rb", "require 'helper'\n"),
            ("test/c_test.rb", "SingleCov.not_covered!\n"),
        ]);
        let scanner = UsageScanner::new(dir.path());
        let err = scanner
            .check_used(&strings(&["test/a_test.rb", "test/b_test.rb", "test/c_test.rb"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "test/b_test.rb: needs to declare coverage");

        scanner
            .check_used(&strings(&["test/a_test.rb", "test/c_test.rb"]))
            .expect("all declared");
    }

    #[test]
    fn unreadable_test_is_an_error() {
        let dir = project(&[]);
        let err = UsageScanner::new(dir.path())
            .check_used(&strings(&["test/gone_test.rb"]))
            .unwrap_err();
        assert!(matches!(err, UsageError::Read { .. }));
    }

    #[test]
    fn full_coverage_list_tracks_declarations() {
        let dir = project(&[
            ("test/a_test.rb", "SingleCov.covered!\n"),
            ("test/b_test.rb", "SingleCov.covered! uncovered: 2\n"),
            ("test/c_test.rb", "SingleCov.not_covered!\n"),
        ]);
        let scanner = UsageScanner::new(dir.path());
        let tests = strings(&["test/a_test.rb", "test/b_test.rb", "test/c_test.rb"]);

        scanner
            .check_full_coverage(&tests, &strings(&["test/a_test.rb"]))
            .expect("list matches");

        let err = scanner
            .check_full_coverage(&tests, &strings(&["test/b_test.rb"]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "test/a_test.rb: declares full coverage, add it to the complete list\n\
             test/b_test.rb: declares uncovered locations, remove it from the complete list"
        );
    }

    #[test]
    fn custom_pattern_must_compile() {
        assert!(matches!(
            UsageScanner::with_pattern("/repo", "(unclosed"),
            Err(UsageError::InvalidPattern { .. })
        ));
        let scanner = UsageScanner::with_pattern("/repo", r"Cov\.declare").expect("valid");
        assert_eq!(scanner.classify("Cov.declare\n"), DeclarationKind::Full);
    }
}
