//! Error types for SingleCov kernel operations.
//!
//! Resolution errors are hard stops: no sensible production file can be
//! named without operator input. Audit outcomes are not errors at all; they
//! are collected as [`crate::audit::Finding`]s and carry a [`Severity`].

/// Errors raised while mapping a test file to the production file it covers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The caller (or the rewritten result) lives outside the project root.
    #[error(
        "Found file {path} which is not relative to the root {root}.\n\
         Use an explicit `file` in the declaration to set the covered file location."
    )]
    PathOutsideRoot { path: String, root: String },

    /// Neither a `test/` nor a `spec/` segment appears in the path.
    #[error("{path} includes neither 'test' nor 'spec' folder ... unable to resolve")]
    NoTestMarker { path: String },

    /// The file name carries none of the supported test naming conventions.
    #[error(
        "Unable to remove test extension from {path} ... /test_, _test.{extension} and \
         _spec.{extension} are supported"
    )]
    UnresolvableTestName { path: String, extension: String },

    /// The guessed production file does not exist under the root.
    #[error(
        "Tried to guess covered file as {path}, but it does not exist.\n\
         Use an explicit `file` in the declaration to set the covered file location."
    )]
    GuessedFileMissing { path: String },

    /// An explicitly declared file was given as an absolute path.
    #[error("{path}: use paths relative to project root.")]
    ExplicitPathAbsolute { path: String },

    /// An explicitly declared file does not exist under the root.
    #[error("{path} does not exist, use paths relative to project root.")]
    ExplicitFileMissing { path: String },

    /// A configured pattern (rewrite rule, extension) failed to compile.
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Severity of an audit finding.
///
/// Warnings are advisory and never change the verdict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn is_fatal(self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}
