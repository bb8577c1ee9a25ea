//! Repository completeness: every production file has a test.

use crate::error::ResolveError;
use crate::resolver::Resolver;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletenessError {
    /// Allow-listed files that now have a test.
    #[error("Remove {files:?} from untested!")]
    StaleUntested { files: Vec<String> },

    #[error("{}", missing_lines(.files))]
    MissingTests { files: Vec<String> },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

fn missing_lines(files: &[String]) -> String {
    files
        .iter()
        .map(|file| format!("missing test for {file}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare production files against the files the tests cover.
///
/// Tests are mapped with [`Resolver::guess`]; a guessed file need not exist.
/// Stale allow-list entries are reported before missing tests.
pub fn check_completeness(
    resolver: &Resolver,
    production: &[String],
    tests: &[String],
    allowed_untested: &[String],
) -> Result<(), CompletenessError> {
    let covered = tests
        .iter()
        .map(|test| resolver.guess(test))
        .collect::<Result<BTreeSet<_>, _>>()?;

    let missing: Vec<&String> = production
        .iter()
        .filter(|file| !covered.contains(file.as_str()))
        .collect();

    let stale: Vec<String> = allowed_untested
        .iter()
        .filter(|file| !missing.contains(file))
        .cloned()
        .collect();
    if !stale.is_empty() {
        return Err(CompletenessError::StaleUntested { files: stale });
    }

    let missing: Vec<String> = missing
        .into_iter()
        .filter(|file| !allowed_untested.contains(file))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CompletenessError::MissingTests { files: missing });
    }

    debug!(
        production = production.len(),
        tests = tests.len(),
        untested = allowed_untested.len(),
        "every production file has a test"
    );
    Ok(())
}
