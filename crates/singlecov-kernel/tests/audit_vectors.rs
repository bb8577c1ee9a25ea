//! Integration tests: run the audit fixture vectors.
//!
//! Each fixture in tests/fixtures/ has:
//! - case.json: project root, declarations, raw coverage, optional sources
//!   and preloaded paths
//! - expect.json: the expected serialized audit report
//!
//! The report must match exactly, including location order and text.

use serde_json::Value;
use singlecov_kernel::audit::Auditor;
use singlecov_kernel::coverage::CoverageResult;
use singlecov_kernel::diff::DiffEngine;
use singlecov_kernel::identity::FixedIdentity;
use singlecov_kernel::registry::{CoverageExpectation, CoverageRegistry};
use singlecov_kernel::source::MemorySource;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer().with_target(true))
            .with(filter)
            .try_init();
    });
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_json(path: &PathBuf) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}

fn run_fixture(name: &str) {
    init_test_logging();
    let dir = fixtures_dir().join(name);
    let case = read_json(&dir.join("case.json"));
    let expected = read_json(&dir.join("expect.json"));

    let root = case["root"].as_str().expect("missing root field");

    let identity = FixedIdentity::new("fixture");
    let mut registry = CoverageRegistry::new();
    for declaration in case["declarations"].as_array().expect("missing declarations") {
        let file = declaration["file"].as_str().expect("declaration without file");
        let uncovered = declaration["uncovered"].as_u64().unwrap_or(0) as u32;
        registry.push(CoverageExpectation::new(file, uncovered), &identity);
    }

    let coverage = CoverageResult::from_value(case["coverage"].clone())
        .unwrap_or_else(|e| panic!("bad coverage in {name}: {e}"));

    let mut source = MemorySource::new();
    if let Some(sources) = case["sources"].as_object() {
        for (file, text) in sources {
            source = source.with_file(file.clone(), text.as_str().unwrap_or_default());
        }
    }

    let preloaded: BTreeSet<String> = case["preloaded"]
        .as_array()
        .map(|paths| {
            paths
                .iter()
                .filter_map(|path| path.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let engine = DiffEngine::new();
    let report = Auditor::new(root, &engine, &source).audit_all(&registry, &coverage, &preloaded);
    let result_json = serde_json::to_value(&report).expect("failed to serialize report");

    assert_eq!(
        result_json,
        expected,
        "\n\nFixture: {name}\n\nGot:\n{}\n\nExpected:\n{}\n",
        serde_json::to_string_pretty(&result_json).unwrap(),
        serde_json::to_string_pretty(&expected).unwrap(),
    );
}

#[test]
fn regressed_single_line() {
    run_fixture("regressed_single_line");
}

#[test]
fn fully_covered() {
    run_fixture("fully_covered");
}

#[test]
fn branch_columns_one_based() {
    run_fixture("branch_columns_one_based");
}

#[test]
fn mixed_ordering() {
    run_fixture("mixed_ordering");
}

#[test]
fn suppressed_by_marker() {
    run_fixture("suppressed_by_marker");
}

#[test]
fn improved_single_file() {
    run_fixture("improved_single_file");
}

#[test]
fn improved_multi_file_is_silent() {
    run_fixture("improved_multi_file_is_silent");
}

#[test]
fn missing_coverage() {
    run_fixture("missing_coverage");
}
