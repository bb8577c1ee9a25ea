//! Enforcement audit: every declared expectation against one coverage snapshot.
//!
//! Per-file outcomes never abort the pass. Non-matching files become
//! [`Finding`]s; the run fails iff any finding is an error. Improvements are
//! advisory and only reported when a single file was declared.

use crate::coverage::CoverageResult;
use crate::diff::{DiffEngine, UncoveredLocation, Verdict};
use crate::error::Severity;
use crate::registry::{CoverageExpectation, CoverageRegistry};
use crate::source::SourceProvider;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// Diagnostic lines printed before output is cut off.
pub const MAX_OUTPUT: usize = 40;
pub const TRUNCATION_NOTICE: &str = "... coverage output truncated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Regressed,
    Improved,
    NoCoverageRecorded,
}

/// One non-matching file, with its rendered diagnostic lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub file: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub expected_uncovered: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_uncovered: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<UncoveredLocation>,
    pub lines: Vec<String>,
}

impl Finding {
    fn regressed(expectation: &CoverageExpectation, locations: Vec<UncoveredLocation>) -> Self {
        let file = &expectation.file;
        let actual = locations.len() as u32;
        let mut lines = vec![
            format!(
                "{file} new uncovered lines introduced ({actual} current vs {} configured)",
                expectation.expected_uncovered
            ),
            "Lines missing coverage:".to_string(),
        ];
        lines.extend(locations.iter().map(|location| location.display(file)));
        Self {
            file: file.clone(),
            kind: FindingKind::Regressed,
            severity: Severity::Error,
            expected_uncovered: expectation.expected_uncovered,
            actual_uncovered: Some(actual),
            locations,
            lines,
        }
    }

    fn improved(expectation: &CoverageExpectation, actual: u32) -> Self {
        let file = &expectation.file;
        Self {
            file: file.clone(),
            kind: FindingKind::Improved,
            severity: Severity::Warning,
            expected_uncovered: expectation.expected_uncovered,
            actual_uncovered: Some(actual),
            locations: Vec::new(),
            lines: vec![format!(
                "{file} has less uncovered lines ({actual} current vs {} configured), \
                 decrement configured uncovered",
                expectation.expected_uncovered
            )],
        }
    }

    fn no_coverage(expectation: &CoverageExpectation, preloaded: bool) -> Self {
        let file = &expectation.file;
        let line = if preloaded {
            format!(
                "{file} was expected to be covered, but was already loaded before coverage \
                 started, which makes it uncoverable."
            )
        } else {
            format!("{file} was expected to be covered, but was never loaded.")
        };
        Self {
            file: file.clone(),
            kind: FindingKind::NoCoverageRecorded,
            severity: Severity::Error,
            expected_uncovered: expectation.expected_uncovered,
            actual_uncovered: None,
            locations: Vec::new(),
            lines: vec![line],
        }
    }
}

/// Aggregated result of one audit pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub pass: bool,
    pub checked: usize,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<String>,
    pub truncated: bool,
}

impl AuditReport {
    pub fn result(&self) -> &'static str {
        if self.pass { "accepted" } else { "rejected" }
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity.is_fatal())
    }

    pub fn render(&self) -> String {
        self.diagnostics.join("\n")
    }
}

/// Runs the diff engine over a registry.
pub struct Auditor<'a> {
    root: PathBuf,
    engine: &'a DiffEngine,
    source: &'a dyn SourceProvider,
    max_output: usize,
}

impl<'a> Auditor<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        engine: &'a DiffEngine,
        source: &'a dyn SourceProvider,
    ) -> Self {
        Self {
            root: root.into(),
            engine,
            source,
            max_output: MAX_OUTPUT,
        }
    }

    pub fn max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    /// Coverage snapshot key of a root-relative file.
    pub fn coverage_key(&self, file: &str) -> String {
        self.root.join(file).display().to_string()
    }

    /// Audit every expectation in `registry`.
    ///
    /// `preloaded` holds absolute paths loaded before recording started.
    pub fn audit_all(
        &self,
        registry: &CoverageRegistry,
        coverage: &CoverageResult,
        preloaded: &BTreeSet<String>,
    ) -> AuditReport {
        let single_file = registry.is_single_file_run();
        let mut findings = Vec::new();

        for expectation in registry.expectations() {
            let key = self.coverage_key(&expectation.file);
            let verdict = self.engine.evaluate(
                expectation,
                coverage.get(&key),
                preloaded.contains(&key),
                self.source,
            );
            debug!(file = %expectation.file, ?verdict, "evaluated");

            match verdict {
                Verdict::Matched => {}
                Verdict::Regressed { locations, .. } => {
                    findings.push(Finding::regressed(expectation, locations));
                }
                Verdict::Improved { actual, .. } => {
                    if single_file {
                        findings.push(Finding::improved(expectation, actual));
                    }
                }
                Verdict::NoCoverageRecorded { preloaded } => {
                    findings.push(Finding::no_coverage(expectation, preloaded));
                }
            }
        }

        let pass = findings.iter().all(|f| !f.severity.is_fatal());
        let mut diagnostics: Vec<String> =
            findings.iter().flat_map(|f| f.lines.iter().cloned()).collect();
        let truncated = diagnostics.len() >= self.max_output && !diagnostics.is_empty();
        if truncated {
            diagnostics.truncate(self.max_output);
            diagnostics.push(TRUNCATION_NOTICE.to_string());
        }

        info!(
            checked = registry.len(),
            findings = findings.len(),
            pass,
            "coverage audit finished"
        );
        AuditReport {
            pass,
            checked: registry.len(),
            findings,
            diagnostics,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::RawFileCoverage;
    use crate::identity::FixedIdentity;
    use crate::source::MemorySource;

    fn registry(entries: &[(&str, u32)]) -> CoverageRegistry {
        let identity = FixedIdentity::new("main");
        let mut registry = CoverageRegistry::new();
        for (file, uncovered) in entries {
            registry.push(CoverageExpectation::new(*file, *uncovered), &identity);
        }
        registry
    }

    fn coverage(entries: Vec<(&str, Vec<Option<u64>>)>) -> CoverageResult {
        let mut result = CoverageResult::default();
        for (file, hits) in entries {
            result.insert(format!("/repo/{file}"), RawFileCoverage::Lines(hits));
        }
        result
    }

    fn audit(registry: &CoverageRegistry, coverage: &CoverageResult) -> AuditReport {
        let engine = DiffEngine::new();
        let source = MemorySource::new();
        Auditor::new("/repo", &engine, &source).audit_all(registry, coverage, &BTreeSet::new())
    }

    #[test]
    fn regression_fails_with_every_location() {
        let registry = registry(&[("lib/a.rb", 0)]);
        let coverage = coverage(vec![("lib/a.rb", vec![None, Some(1), Some(0), Some(1), None])]);
        let report = audit(&registry, &coverage);

        assert!(!report.pass);
        assert_eq!(report.result(), "rejected");
        insta::assert_snapshot!(report.render(), @r"
        lib/a.rb new uncovered lines introduced (1 current vs 0 configured)
        Lines missing coverage:
        lib/a.rb:3
        ");
    }

    #[test]
    fn fully_covered_passes_silently() {
        let registry = registry(&[("lib/a.rb", 0)]);
        let coverage = coverage(vec![("lib/a.rb", vec![None, Some(1), Some(1), Some(1), None])]);
        let report = audit(&registry, &coverage);
        assert!(report.pass);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.checked, 1);
    }

    #[test]
    fn improvement_warns_on_single_file_runs_only() {
        let coverage = coverage(vec![("lib/a.rb", vec![None, Some(1)])]);

        let single = audit(&registry(&[("lib/a.rb", 1)]), &coverage);
        assert!(single.pass);
        assert_eq!(
            single.diagnostics,
            vec![
                "lib/a.rb has less uncovered lines (0 current vs 1 configured), decrement configured uncovered"
                    .to_string()
            ]
        );
        assert_eq!(single.findings[0].severity, Severity::Warning);

        let multi = audit(&registry(&[("lib/a.rb", 1), ("lib/a.rb", 0)]), &coverage);
        assert!(multi.pass);
        assert!(multi.diagnostics.is_empty());
    }

    #[test]
    fn missing_coverage_is_fatal_and_explained() {
        let registry = registry(&[("lib/a.rb", 0), ("lib/b.rb", 0)]);
        let coverage = CoverageResult::default();
        let engine = DiffEngine::new();
        let source = MemorySource::new();
        let preloaded: BTreeSet<String> = ["/repo/lib/b.rb".to_string()].into_iter().collect();
        let report =
            Auditor::new("/repo", &engine, &source).audit_all(&registry, &coverage, &preloaded);

        assert!(!report.pass);
        assert_eq!(
            report.diagnostics,
            vec![
                "lib/a.rb was expected to be covered, but was never loaded.".to_string(),
                "lib/b.rb was expected to be covered, but was already loaded before coverage started, which makes it uncoverable.".to_string(),
            ]
        );
    }

    #[test]
    fn output_is_truncated_but_verdict_is_not() {
        let hits: Vec<Option<u64>> = vec![Some(0); 60];
        let registry = registry(&[("lib/a.rb", 0)]);
        let mut coverage = CoverageResult::default();
        coverage.insert("/repo/lib/a.rb", RawFileCoverage::Lines(hits));

        let report = audit(&registry, &coverage);
        assert!(!report.pass);
        assert!(report.truncated);
        assert_eq!(report.diagnostics.len(), MAX_OUTPUT + 1);
        assert_eq!(report.diagnostics.last().map(String::as_str), Some(TRUNCATION_NOTICE));
        assert_eq!(report.findings[0].locations.len(), 60);
    }

    #[test]
    fn auditing_twice_is_idempotent() {
        let registry = registry(&[("lib/a.rb", 0), ("lib/b.rb", 1)]);
        let coverage = coverage(vec![
            ("lib/a.rb", vec![Some(0), Some(1)]),
            ("lib/b.rb", vec![Some(0), Some(0)]),
        ]);
        let first = audit(&registry, &coverage);
        let second = audit(&registry, &coverage);
        assert_eq!(first, second);
        assert_eq!(first.findings.len(), 2);
    }
}
