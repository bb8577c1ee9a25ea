//! Raw coverage snapshot, as produced by the instrumentation collaborator.
//!
//! A snapshot maps absolute file paths to either a flat array of line hits or
//! a structured record with `lines` and `branches`. Branch groups and leaves
//! are keyed by SimpleCov-style stringified tuples:
//!
//! ```text
//! "[:if, 0, 4, 4, 4, 23]"  →  kind, id, start line, start col, end line, end col
//! ```
//!
//! Columns in the snapshot are 0-based.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// Errors raised while loading a raw coverage snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("failed to read coverage snapshot {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid coverage snapshot {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed branch key {0:?}: expected [:kind, id, line, col, line, col]")]
    BranchKey(String),
}

/// Identity and position of one branch group or leaf.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchId {
    pub kind: String,
    pub id: u64,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl BranchId {
    pub fn new(
        kind: impl Into<String>,
        id: u64,
        start: (u32, u32),
        end: (u32, u32),
    ) -> Self {
        Self {
            kind: kind.into(),
            id,
            start_line: start.0,
            start_column: start.1,
            end_line: end.0,
            end_column: end.1,
        }
    }

    /// The (line, col, line, col) span, the identity leaves are summed under.
    pub fn span(&self) -> (u32, u32, u32, u32) {
        (
            self.start_line,
            self.start_column,
            self.end_line,
            self.end_column,
        )
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[:{}, {}, {}, {}, {}, {}]",
            self.kind, self.id, self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

fn branch_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[\s*:?(\w+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\]$",
        )
        .expect("branch key regex must compile")
    })
}

impl FromStr for BranchId {
    type Err = CoverageError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let bad = || CoverageError::BranchKey(raw.to_string());
        let caps = branch_key_re().captures(raw.trim()).ok_or_else(bad)?;
        let num = |i: usize| caps[i].parse::<u64>().map_err(|_| bad());
        let pos = |i: usize| caps[i].parse::<u32>().map_err(|_| bad());
        Ok(Self {
            kind: caps[1].to_string(),
            id: num(2)?,
            start_line: pos(3)?,
            start_column: pos(4)?,
            end_line: pos(5)?,
            end_column: pos(6)?,
        })
    }
}

/// Branch group → (leaf → hit count).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchMap(pub BTreeMap<BranchId, BTreeMap<BranchId, u64>>);

impl BranchMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, group: BranchId, leaf: BranchId, count: u64) {
        self.0.entry(group).or_default().insert(leaf, count);
    }

    pub fn groups(&self) -> impl Iterator<Item = (&BranchId, &BTreeMap<BranchId, u64>)> {
        self.0.iter()
    }
}

impl Serialize for BranchMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keyed: BTreeMap<String, BTreeMap<String, u64>> = self
            .0
            .iter()
            .map(|(group, leaves)| {
                let leaves = leaves
                    .iter()
                    .map(|(leaf, count)| (leaf.to_string(), *count))
                    .collect();
                (group.to_string(), leaves)
            })
            .collect();
        keyed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BranchMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let keyed = BTreeMap::<String, BTreeMap<String, u64>>::deserialize(deserializer)?;
        let mut map = BranchMap::default();
        for (group, leaves) in keyed {
            let group: BranchId = group.parse().map_err(D::Error::custom)?;
            let entry = map.0.entry(group).or_default();
            for (leaf, count) in leaves {
                let leaf: BranchId = leaf.parse().map_err(D::Error::custom)?;
                entry.insert(leaf, count);
            }
        }
        Ok(map)
    }
}

/// Line hits plus optional branch data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredCoverage {
    #[serde(default)]
    pub branches: BranchMap,
    pub lines: Vec<Option<u64>>,
}

/// Coverage of one production file.
///
/// Line hits are indexed by line number - 1: `None` is a non-executable line,
/// `Some(0)` executable but never run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFileCoverage {
    Lines(Vec<Option<u64>>),
    Structured(StructuredCoverage),
}

impl RawFileCoverage {
    pub fn lines(&self) -> &[Option<u64>] {
        match self {
            RawFileCoverage::Lines(lines) => lines,
            RawFileCoverage::Structured(record) => &record.lines,
        }
    }

    pub fn branches(&self) -> Option<&BranchMap> {
        match self {
            RawFileCoverage::Lines(_) => None,
            RawFileCoverage::Structured(record) => Some(&record.branches),
        }
    }

    /// Drop branch data, keeping only line hits.
    pub fn to_lines_only(&self) -> RawFileCoverage {
        RawFileCoverage::Lines(self.lines().to_vec())
    }
}

/// Whole-run coverage keyed by absolute file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageResult(pub BTreeMap<String, RawFileCoverage>);

impl CoverageResult {
    pub fn get(&self, absolute_path: &str) -> Option<&RawFileCoverage> {
        self.0.get(absolute_path)
    }

    pub fn insert(&mut self, absolute_path: impl Into<String>, coverage: RawFileCoverage) {
        self.0.insert(absolute_path.into(), coverage);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a snapshot, accepting both the bare map and a previously written
    /// report (`{"<suite>": {"coverage": {...}, "timestamp": n}}`).
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if let Some(inner) = unwrap_report(&value) {
            return serde_json::from_value(inner.clone());
        }
        serde_json::from_value(value)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoverageError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| CoverageError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let parse_err = |source| CoverageError::Parse {
            path: path.display().to_string(),
            source,
        };
        let value: Value = serde_json::from_slice(&bytes).map_err(parse_err)?;
        Self::from_value(value).map_err(parse_err)
    }
}

fn unwrap_report(value: &Value) -> Option<&Value> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    let suite = object.values().next()?.as_object()?;
    if suite.contains_key("timestamp") {
        suite.get("coverage")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn branch_keys_parse_and_print() {
        let id: BranchId = "[:if, 0, 4, 4, 4, 23]".parse().expect("valid key");
        assert_eq!(id, BranchId::new("if", 0, (4, 4), (4, 23)));
        assert_eq!(id.to_string(), "[:if, 0, 4, 4, 4, 23]");
        assert_eq!(id.span(), (4, 4, 4, 23));

        let bare: BranchId = "[then,1,4,19,4,22]".parse().expect("bare kind");
        assert_eq!(bare.kind, "then");

        assert!("[:if, 0, 4]".parse::<BranchId>().is_err());
        assert!("if 0 4 4 4 23".parse::<BranchId>().is_err());
    }

    #[test]
    fn parses_flat_and_structured_records() {
        let value = json!({
            "/repo/lib/a.rb": [null, 1, 0, 1, null],
            "/repo/lib/b.rb": {
                "lines": [null, 2],
                "branches": {
                    "[:if, 0, 2, 0, 2, 10]": {
                        "[:then, 1, 2, 0, 2, 4]": 2,
                        "[:else, 2, 2, 0, 2, 10]": 0
                    }
                }
            },
            "/repo/lib/c.rb": {"lines": [1]}
        });
        let result = CoverageResult::from_value(value).expect("snapshot parses");
        assert_eq!(result.len(), 3);

        let a = result.get("/repo/lib/a.rb").expect("a");
        assert_eq!(a.lines(), &[None, Some(1), Some(0), Some(1), None]);
        assert!(a.branches().is_none());

        let b = result.get("/repo/lib/b.rb").expect("b");
        let branches = b.branches().expect("structured");
        let (_, leaves) = branches.groups().next().expect("one group");
        assert_eq!(leaves.len(), 2);

        let c = result.get("/repo/lib/c.rb").expect("c");
        assert!(c.branches().is_some_and(BranchMap::is_empty));
    }

    #[test]
    fn rejects_malformed_branch_keys() {
        let value = json!({"/repo/lib/a.rb": {"lines": [], "branches": {"oops": {}}}});
        assert!(CoverageResult::from_value(value).is_err());
    }

    #[test]
    fn accepts_previously_written_report() {
        let value = json!({
            "Minitest": {
                "coverage": {"/repo/lib/a.rb": [null, 1]},
                "timestamp": 1700000000
            }
        });
        let result = CoverageResult::from_value(value).expect("report parses");
        assert_eq!(
            result.get("/repo/lib/a.rb").map(RawFileCoverage::lines),
            Some(&[None, Some(1)][..])
        );
    }

    #[test]
    fn branch_map_serializes_with_string_keys() {
        let mut branches = BranchMap::default();
        branches.insert(
            BranchId::new("if", 0, (4, 4), (4, 23)),
            BranchId::new("then", 1, (4, 4), (4, 8)),
            1,
        );
        let record = RawFileCoverage::Structured(StructuredCoverage {
            branches,
            lines: vec![None, Some(1)],
        });
        let value = serde_json::to_value(&record).expect("serializes");
        assert_eq!(
            value,
            json!({
                "branches": {"[:if, 0, 4, 4, 4, 23]": {"[:then, 1, 4, 4, 4, 8]": 1}},
                "lines": [null, 1]
            })
        );
        assert_eq!(record.to_lines_only(), RawFileCoverage::Lines(vec![None, Some(1)]));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = CoverageResult::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CoverageError::Read { .. }));
    }
}
