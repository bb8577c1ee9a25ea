//! # SingleCov Kernel
//!
//! Per-file coverage enforcement: each production file is covered by one
//! designated test file, and the number of locations it leaves uncovered may
//! only shrink.
//!
//! ## Architecture
//!
//! ```text
//! Resolver          ← test path → production path, by convention
//!     │
//! CoverageRegistry  ← declarations made while test files load
//!     │
//! DiffEngine        ← raw line/branch hits → ordered uncovered locations
//!     │
//! Auditor           ← every declaration vs one coverage snapshot
//!     │
//! EnforcementSession ← owner gate, run-scope gate, report artifact
//! ```
//!
//! Repository-wide checks (`completeness`, `usage`) work on file lists
//! produced by `discovery` and need no coverage data.

pub mod audit;
pub mod completeness;
pub mod config;
pub mod coverage;
pub mod diff;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod run_scope;
pub mod session;
pub mod source;
pub mod usage;

pub use audit::{AuditReport, Auditor, Finding, FindingKind, MAX_OUTPUT};
pub use completeness::{CompletenessError, check_completeness};
pub use config::{ConfigError, RewriteRule, SingleCovConfig};
pub use coverage::{BranchId, BranchMap, CoverageError, CoverageResult, RawFileCoverage};
pub use diff::{DiffEngine, UncoveredLocation, Verdict};
pub use discovery::{DiscoveryError, production_files, test_files};
pub use error::{ResolveError, Severity};
pub use identity::{FixedIdentity, IdentityProvider, OwnerToken, ProcessIdentity};
pub use manifest::{Declaration, ManifestError, apply_declarations, load_declarations};
pub use registry::{CoverageExpectation, CoverageRegistry};
pub use report::{ReportError, ReportOptions};
pub use resolver::{PathRewriter, RegexRewriter, Resolver};
pub use run_scope::{Framework, RunScope};
pub use session::{EnforcementSession, FinishedRun, SessionOutcome, SkipReason};
pub use source::{FsSource, MemorySource, SourceProvider};
pub use usage::{UsageError, UsageScanner};
