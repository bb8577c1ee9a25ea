//! Designating-process identity.
//!
//! Declarations record which process made them. Only that process audits, so
//! forked workers that inherit a registry snapshot stay silent.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerToken(pub String);

impl OwnerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the current worker's identity.
pub trait IdentityProvider {
    fn current(&self) -> OwnerToken;
}

/// Identity of the running OS process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessIdentity;

impl IdentityProvider for ProcessIdentity {
    fn current(&self) -> OwnerToken {
        OwnerToken(format!("pid:{}", std::process::id()))
    }
}

/// A fixed identity, for workers identified by something other than a pid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIdentity(pub OwnerToken);

impl FixedIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(OwnerToken::new(token))
    }
}

impl IdentityProvider for FixedIdentity {
    fn current(&self) -> OwnerToken {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_identity_is_stable_within_a_process() {
        let identity = ProcessIdentity;
        assert_eq!(identity.current(), identity.current());
        assert_eq!(
            identity.current().to_string(),
            format!("pid:{}", std::process::id())
        );
    }

    #[test]
    fn fixed_identity_reports_its_token() {
        assert_eq!(FixedIdentity::new("worker-1").current(), OwnerToken::new("worker-1"));
    }
}
