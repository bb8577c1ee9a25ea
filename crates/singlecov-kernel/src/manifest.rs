//! Declaration manifest: one JSON object per line, recorded by the test
//! harness as each test file declares itself.
//!
//! ```text
//! {"test": "test/models/user_test.rb:3:in `<top (required)>'", "uncovered": 1}
//! {"test": "test/lib/odd_test.rb", "file": "lib/odd/thing.rb"}
//! {"test": "test/integration/smoke_test.rb", "excluded": true}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::error::ResolveError;
use crate::identity::IdentityProvider;
use crate::registry::CoverageRegistry;
use crate::resolver::Resolver;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid declaration on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("declaration on line {line} is excluded but also names a file or uncovered count")]
    Conflicting { line: usize },

    #[error("declaration on line {line}: {source}")]
    Resolve {
        line: usize,
        #[source]
        source: ResolveError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    /// Caller location of the declaring test file.
    pub test: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncovered: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub excluded: bool,
    /// 1-based manifest line.
    #[serde(skip)]
    pub line: usize,
}

pub fn parse_declarations(text: &str) -> Result<Vec<Declaration>, ManifestError> {
    let mut declarations = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = index + 1;
        let mut declaration: Declaration =
            serde_json::from_str(trimmed).map_err(|source| ManifestError::Parse { line, source })?;
        if declaration.excluded && (declaration.file.is_some() || declaration.uncovered.is_some()) {
            return Err(ManifestError::Conflicting { line });
        }
        declaration.line = line;
        declarations.push(declaration);
    }
    Ok(declarations)
}

pub fn load_declarations(path: impl AsRef<Path>) -> Result<Vec<Declaration>, ManifestError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_declarations(&text)
}

/// Replay declarations into `registry`, stopping at the first that cannot
/// be resolved.
pub fn apply_declarations(
    registry: &mut CoverageRegistry,
    resolver: &Resolver,
    identity: &dyn IdentityProvider,
    declarations: &[Declaration],
) -> Result<(), ManifestError> {
    for declaration in declarations {
        if declaration.excluded {
            registry.declare_excluded(identity);
            continue;
        }
        registry
            .declare_covered(
                resolver,
                identity,
                declaration.file.as_deref(),
                &declaration.test,
                declaration.uncovered.unwrap_or(0),
            )
            .map_err(|source| ManifestError::Resolve {
                line: declaration.line,
                source,
            })?;
    }
    debug!(
        declared = registry.len(),
        excluded = registry.excluded_count(),
        "applied declarations"
    );
    Ok(())
}
