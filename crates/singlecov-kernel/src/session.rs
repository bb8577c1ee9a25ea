//! One enforcement session: declare during the run, audit once at the end.
//!
//! The session owns the registry and returns a [`SessionOutcome`] instead of
//! deciding the process exit status itself.

use crate::audit::{AuditReport, Auditor, MAX_OUTPUT};
use crate::coverage::CoverageResult;
use crate::diff::DiffEngine;
use crate::error::ResolveError;
use crate::identity::{IdentityProvider, OwnerToken};
use crate::manifest::{Declaration, ManifestError, apply_declarations};
use crate::registry::{CoverageExpectation, CoverageRegistry};
use crate::report::{ReportError, ReportOptions, write_report};
use crate::resolver::Resolver;
use crate::run_scope::RunScope;
use crate::source::SourceProvider;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "status", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    /// Not the process that set the session up, e.g. a forked worker.
    NotOwner,
    PartialRun,
    TestsFailed(i32),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "coverage enforcement disabled"),
            SkipReason::NotOwner => write!(f, "not the designating process"),
            SkipReason::PartialRun => write!(f, "only a subset of tests ran"),
            SkipReason::TestsFailed(status) => write!(f, "test run failed with status {status}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Audited(AuditReport),
    Skipped(SkipReason),
}

impl SessionOutcome {
    /// Skipped sessions never fail the run.
    pub fn passed(&self) -> bool {
        match self {
            SessionOutcome::Audited(report) => report.pass,
            SessionOutcome::Skipped(_) => true,
        }
    }
}

/// Everything the end of a test run hands to [`EnforcementSession::finish`].
#[derive(Debug, Clone, Copy)]
pub struct FinishedRun<'a> {
    pub coverage: &'a CoverageResult,
    /// Absolute paths loaded before recording started.
    pub preloaded: &'a BTreeSet<String>,
    pub exit_status: i32,
    pub scope: RunScope,
}

pub struct EnforcementSession {
    resolver: Resolver,
    engine: DiffEngine,
    identity: Box<dyn IdentityProvider>,
    owner: OwnerToken,
    registry: CoverageRegistry,
    report: Option<ReportOptions>,
    max_output: usize,
    disabled: bool,
}

impl EnforcementSession {
    /// Start a session; the current identity becomes the designated auditor.
    pub fn new(
        resolver: Resolver,
        engine: DiffEngine,
        identity: impl IdentityProvider + 'static,
    ) -> Self {
        let owner = identity.current();
        Self {
            resolver,
            engine,
            identity: Box::new(identity),
            owner,
            registry: CoverageRegistry::new(),
            report: None,
            max_output: MAX_OUTPUT,
            disabled: false,
        }
    }

    pub fn with_report(mut self, report: Option<ReportOptions>) -> Self {
        self.report = report;
        self
    }

    pub fn max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    /// Silence this session, e.g. in a forked worker.
    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn registry(&self) -> &CoverageRegistry {
        &self.registry
    }

    pub fn declare_covered(
        &mut self,
        explicit: Option<&str>,
        caller: &str,
        expected_uncovered: u32,
    ) -> Result<&CoverageExpectation, ResolveError> {
        self.registry.declare_covered(
            &self.resolver,
            self.identity.as_ref(),
            explicit,
            caller,
            expected_uncovered,
        )
    }

    pub fn declare_excluded(&mut self) {
        self.registry.declare_excluded(self.identity.as_ref());
    }

    pub fn apply(&mut self, declarations: &[Declaration]) -> Result<(), ManifestError> {
        apply_declarations(
            &mut self.registry,
            &self.resolver,
            self.identity.as_ref(),
            declarations,
        )
    }

    fn skip_reason(&self, run: &FinishedRun<'_>) -> Option<SkipReason> {
        let current = self.identity.current();
        if self.disabled {
            Some(SkipReason::Disabled)
        } else if current != self.owner || !self.registry.is_owner(self.identity.as_ref()) {
            Some(SkipReason::NotOwner)
        } else if !run.scope.is_full() {
            Some(SkipReason::PartialRun)
        } else if run.exit_status != 0 {
            Some(SkipReason::TestsFailed(run.exit_status))
        } else {
            None
        }
    }

    /// Write the report (when configured) and audit every declaration.
    pub fn finish(
        &self,
        run: &FinishedRun<'_>,
        source: &dyn SourceProvider,
    ) -> Result<SessionOutcome, ReportError> {
        if let Some(reason) = self.skip_reason(run) {
            info!(%reason, "skipping coverage audit");
            return Ok(SessionOutcome::Skipped(reason));
        }

        if let Some(options) = &self.report {
            let declared: BTreeSet<String> = self
                .registry
                .declared_files()
                .into_iter()
                .map(|file| self.absolute_key(file))
                .collect();
            write_report(options, run.coverage, &declared, Utc::now().timestamp())?;
        }

        let report = Auditor::new(self.resolver.root(), &self.engine, source)
            .max_output(self.max_output)
            .audit_all(&self.registry, run.coverage, run.preloaded);
        if !report.pass {
            warn!(findings = report.findings.len(), "coverage audit failed");
        }
        Ok(SessionOutcome::Audited(report))
    }

    fn absolute_key(&self, file: &str) -> String {
        self.resolver.absolute(file).display().to_string()
    }
}
