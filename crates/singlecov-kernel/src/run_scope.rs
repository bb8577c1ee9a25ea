//! Detect test-framework invocations that run only part of a file.
//!
//! A filtered run records partial coverage, so auditing it would report
//! false regressions. The audit is skipped instead.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Minitest,
    Rspec,
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minitest" => Ok(Framework::Minitest),
            "rspec" => Ok(Framework::Rspec),
            other => Err(format!(
                "unsupported framework {other:?}; expected minitest or rspec"
            )),
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framework::Minitest => write!(f, "minitest"),
            Framework::Rspec => write!(f, "rspec"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    Full,
    Subset,
}

impl RunScope {
    pub fn is_full(self) -> bool {
        matches!(self, RunScope::Full)
    }
}

const MINITEST_FILTER_OPTIONS: &[&str] = &["-n", "--name", "-l", "--line"];
const RSPEC_FILTER_OPTIONS: &[&str] = &["-t", "--tag", "-e", "--example"];

fn line_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":\d+$").expect("line suffix regex must compile"))
}

fn rspec_location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r":\d+$|\[[\d:]+\]$").expect("rspec location regex must compile")
    })
}

/// Classify the arguments a test run was started with.
pub fn detect(framework: Framework, args: &[String]) -> RunScope {
    let subset = match framework {
        Framework::Minitest => {
            let option_filter = args.iter().any(|arg| {
                let name = arg.split('=').next().unwrap_or(arg);
                MINITEST_FILTER_OPTIONS.contains(&name)
            });
            let line_filter = args
                .first()
                .is_some_and(|first| line_suffix_re().is_match(first));
            option_filter || line_filter
        }
        Framework::Rspec => args.iter().any(|arg| {
            RSPEC_FILTER_OPTIONS.contains(&arg.as_str()) || rspec_location_re().is_match(arg)
        }),
    };
    if subset {
        RunScope::Subset
    } else {
        RunScope::Full
    }
}
