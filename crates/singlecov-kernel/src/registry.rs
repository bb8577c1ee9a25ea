//! The run's table of coverage expectations.
//!
//! Test files declare themselves while loading; the audit reads the table
//! once at the end of the run. Entries are appended, never overwritten: a
//! file declared from two test files is checked twice.

use crate::error::ResolveError;
use crate::identity::{IdentityProvider, OwnerToken};
use crate::resolver::Resolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// One declared production file and how many locations may stay uncovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageExpectation {
    pub file: String,
    pub expected_uncovered: u32,
}

impl CoverageExpectation {
    pub fn new(file: impl Into<String>, expected_uncovered: u32) -> Self {
        Self {
            file: file.into(),
            expected_uncovered,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoverageRegistry {
    expectations: Vec<CoverageExpectation>,
    excluded: usize,
    owner: Option<OwnerToken>,
}

impl CoverageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the covered file of a test.
    ///
    /// `explicit` bypasses convention-based resolution of `caller`.
    pub fn declare_covered(
        &mut self,
        resolver: &Resolver,
        identity: &dyn IdentityProvider,
        explicit: Option<&str>,
        caller: &str,
        expected_uncovered: u32,
    ) -> Result<&CoverageExpectation, ResolveError> {
        let file = resolver.covered_file(explicit, caller)?;
        debug!(caller, file = %file, expected_uncovered, "declared covered");
        self.push(CoverageExpectation::new(file, expected_uncovered), identity);
        Ok(&self.expectations[self.expectations.len() - 1])
    }

    /// Record an already-resolved expectation.
    pub fn push(&mut self, expectation: CoverageExpectation, identity: &dyn IdentityProvider) {
        self.expectations.push(expectation);
        self.owner = Some(identity.current());
    }

    /// Declare that a test covers nothing in particular.
    pub fn declare_excluded(&mut self, identity: &dyn IdentityProvider) {
        self.excluded += 1;
        self.owner = Some(identity.current());
    }

    pub fn expectations(&self) -> &[CoverageExpectation] {
        &self.expectations
    }

    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded
    }

    /// Best-effort guess that only one test file is running: exactly one
    /// expectation was declared in this process.
    pub fn is_single_file_run(&self) -> bool {
        self.expectations.len() == 1
    }

    pub fn owner(&self) -> Option<&OwnerToken> {
        self.owner.as_ref()
    }

    /// Whether `identity` may audit. With no declarations yet, anyone may.
    pub fn is_owner(&self, identity: &dyn IdentityProvider) -> bool {
        self.owner
            .as_ref()
            .is_none_or(|owner| *owner == identity.current())
    }

    pub fn declared_files(&self) -> BTreeSet<&str> {
        self.expectations
            .iter()
            .map(|expectation| expectation.file.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FixedIdentity;
    use std::fs;

    fn project() -> (tempfile::TempDir, Resolver) {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib")).expect("lib dir");
        fs::write(dir.path().join("lib/a.rb"), "class A\nend\n").expect("write a.rb");
        let resolver = Resolver::builder(dir.path())
            .working_dir(dir.path())
            .build()
            .expect("resolver");
        (dir, resolver)
    }

    #[test]
    fn declarations_append_without_clobbering() {
        let (_dir, resolver) = project();
        let main = FixedIdentity::new("main");
        let mut registry = CoverageRegistry::new();

        registry
            .declare_covered(&resolver, &main, None, "test/a_test.rb:3", 0)
            .expect("resolved by convention");
        registry
            .declare_covered(&resolver, &main, Some("lib/a.rb"), "test/b_test.rb", 2)
            .expect("explicit file");

        assert_eq!(
            registry.expectations(),
            &[
                CoverageExpectation::new("lib/a.rb", 0),
                CoverageExpectation::new("lib/a.rb", 2),
            ]
        );
        assert!(!registry.is_single_file_run());
        assert_eq!(registry.declared_files().len(), 1);
    }

    #[test]
    fn resolution_failures_leave_registry_untouched() {
        let (_dir, resolver) = project();
        let mut registry = CoverageRegistry::new();
        let err = registry
            .declare_covered(&resolver, &FixedIdentity::new("main"), None, "test/b_test.rb", 0)
            .unwrap_err();
        assert!(matches!(err, ResolveError::GuessedFileMissing { .. }));
        assert!(registry.is_empty());
        assert!(registry.owner().is_none());
    }

    #[test]
    fn ownership_follows_last_declaration() {
        let mut registry = CoverageRegistry::new();
        let main = FixedIdentity::new("main");
        let child = FixedIdentity::new("child");
        assert!(registry.is_owner(&child));

        registry.declare_excluded(&main);
        assert_eq!(registry.excluded_count(), 1);
        assert!(registry.is_owner(&main));
        assert!(!registry.is_owner(&child));
    }
}
