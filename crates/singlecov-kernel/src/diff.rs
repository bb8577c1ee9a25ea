//! Coverage diff engine.
//!
//! Turns one file's raw coverage into the exact, ordered list of uncovered
//! locations and compares its size with the declared expectation:
//!
//! 1. lines with a hit count of exactly 0
//! 2. branch spans whose leaves sum to 0 across every group
//! 3. minus branches starting on an already-uncovered line
//! 4. minus locations whose source line carries the uncovered marker
//! 5. sorted by (start line, start column or 0)

use crate::coverage::{BranchMap, RawFileCoverage};
use crate::registry::CoverageExpectation;
use crate::source::SourceProvider;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Comment pattern that opts a single source line out of enforcement.
pub const DEFAULT_UNCOVERED_MARKER: &str = r"#.*uncovered";

/// A line or branch that never ran.
///
/// Either line-only (no columns) or a full branch span with 1-based columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncoveredLocation {
    start_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_column: Option<u32>,
}

impl UncoveredLocation {
    pub fn line(line: u32) -> Self {
        Self {
            start_line: line,
            start_column: None,
            end_line: None,
            end_column: None,
        }
    }

    pub fn branch(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column: Some(start_column),
            end_line: Some(end_line),
            end_column: Some(end_column),
        }
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn start_column(&self) -> Option<u32> {
        self.start_column
    }

    pub fn is_branch(&self) -> bool {
        self.start_column.is_some()
    }

    fn sort_key(&self) -> (u32, u32, u32, u32) {
        (
            self.start_line,
            self.start_column.unwrap_or(0),
            self.end_line.unwrap_or(0),
            self.end_column.unwrap_or(0),
        )
    }

    /// `file:line`, `file:line:col-endcol` or `file:line:col-endline:endcol`.
    pub fn display(&self, file: &str) -> String {
        match (self.start_column, self.end_line, self.end_column) {
            (Some(col), Some(end_line), Some(end_col)) if end_line == self.start_line => {
                format!("{file}:{}:{col}-{end_col}", self.start_line)
            }
            (Some(col), Some(end_line), Some(end_col)) => {
                format!("{file}:{}:{col}-{end_line}:{end_col}", self.start_line)
            }
            _ => format!("{file}:{}", self.start_line),
        }
    }
}

impl Ord for UncoveredLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for UncoveredLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of comparing one file against its expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Matched,
    Regressed {
        expected: u32,
        locations: Vec<UncoveredLocation>,
    },
    Improved {
        expected: u32,
        actual: u32,
    },
    NoCoverageRecorded {
        preloaded: bool,
    },
}

impl Verdict {
    pub fn is_matched(&self) -> bool {
        matches!(self, Verdict::Matched)
    }
}

/// Line numbers (1-based) whose hit count is exactly zero.
pub fn uncovered_lines(lines: &[Option<u64>]) -> Vec<u32> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, hits)| **hits == Some(0))
        .map(|(index, _)| index as u32 + 1)
        .collect()
}

/// Branch spans that no leaf ever reached.
///
/// Leaves sharing a span are summed across all groups before judging, so a
/// decision counts as covered when any side of it ran. Columns are shifted
/// to 1-based.
pub fn uncovered_branches(branches: &BranchMap) -> Vec<UncoveredLocation> {
    let mut sums: BTreeMap<(u32, u32, u32, u32), u64> = BTreeMap::new();
    for (_, leaves) in branches.groups() {
        for (leaf, count) in leaves {
            *sums.entry(leaf.span()).or_default() += count;
        }
    }
    sums.into_iter()
        .filter(|(_, total)| *total == 0)
        .map(|((line, col, end_line, end_col), _)| {
            UncoveredLocation::branch(line, col + 1, end_line, end_col + 1)
        })
        .collect()
}

/// Computes uncovered locations and verdicts.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    marker: Regex,
    branches: bool,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            marker: Regex::new(DEFAULT_UNCOVERED_MARKER).expect("default marker must compile"),
            branches: true,
        }
    }
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            marker: Regex::new(pattern)?,
            branches: true,
        })
    }

    /// Ignore branch data when `false`, judging line hits only.
    pub fn with_branches(mut self, branches: bool) -> Self {
        self.branches = branches;
        self
    }

    /// Deduplicated, suppression-filtered, sorted uncovered locations.
    pub fn uncovered_locations(
        &self,
        file: &str,
        raw: &RawFileCoverage,
        source: &dyn SourceProvider,
    ) -> Vec<UncoveredLocation> {
        let lines = uncovered_lines(raw.lines());
        let dead_lines: BTreeSet<u32> = lines.iter().copied().collect();

        let mut all: Vec<UncoveredLocation> =
            lines.into_iter().map(UncoveredLocation::line).collect();
        if self.branches
            && let Some(branches) = raw.branches()
        {
            all.extend(
                uncovered_branches(branches)
                    .into_iter()
                    .filter(|location| !dead_lines.contains(&location.start_line)),
            );
        }

        if !all.is_empty()
            && let Some(text) = source.lines(file)
        {
            all.retain(|location| {
                let suppressed = (location.start_line as usize)
                    .checked_sub(1)
                    .and_then(|index| text.get(index))
                    .is_some_and(|line| self.marker.is_match(line));
                if suppressed {
                    debug!(file, line = location.start_line, "suppressed by marker");
                }
                !suppressed
            });
        }

        all.sort();
        all
    }

    /// Compare a declared expectation with the recorded coverage.
    ///
    /// `preloaded` tells whether a file without coverage was loaded before
    /// recording started, which no test can fix.
    pub fn evaluate(
        &self,
        expectation: &CoverageExpectation,
        raw: Option<&RawFileCoverage>,
        preloaded: bool,
        source: &dyn SourceProvider,
    ) -> Verdict {
        let Some(raw) = raw else {
            return Verdict::NoCoverageRecorded { preloaded };
        };

        let locations = self.uncovered_locations(&expectation.file, raw, source);
        let actual = locations.len() as u32;
        let expected = expectation.expected_uncovered;

        match actual.cmp(&expected) {
            Ordering::Equal => Verdict::Matched,
            Ordering::Less => Verdict::Improved { expected, actual },
            Ordering::Greater => Verdict::Regressed {
                expected,
                locations,
            },
        }
    }
}
