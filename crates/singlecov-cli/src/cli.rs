use clap::{Args, Parser, Subcommand, ValueEnum};
use singlecov_kernel::Framework;

#[derive(Parser)]
#[command(
    name = "singlecov",
    about = "SingleCov: per-file coverage enforcement for test suites",
    version
)]
pub struct Cli {
    /// Log kernel decisions to stderr (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the project lives and how it is configured.
#[derive(Args, Clone, Debug)]
pub struct ProjectArgs {
    /// Project root
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Config file (defaults to `<root>/.singlecov.toml` when present)
    #[arg(long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit recorded coverage against every declared expectation
    Audit {
        #[command(flatten)]
        project: ProjectArgs,

        /// Raw coverage snapshot (JSON)
        #[arg(long)]
        coverage: String,

        /// Declaration manifest (JSON Lines)
        #[arg(long)]
        declarations: String,

        /// Absolute or root-relative file loaded before recording started (repeatable)
        #[arg(long = "preloaded")]
        preloaded: Vec<String>,

        /// Test framework the run used
        #[arg(long, value_enum, default_value_t = FrameworkArg::Minitest)]
        framework: FrameworkArg,

        /// Exit status of the test run; non-zero skips the audit
        #[arg(long, default_value_t = 0)]
        test_status: i32,

        /// Write the coverage report artifact here (relative to --root)
        #[arg(long)]
        report: Option<String>,

        /// Report line hits only
        #[arg(long)]
        lines_only: bool,

        /// Judge line hits only, ignoring branch data
        #[arg(long)]
        no_branches: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Arguments the test run was started with
        #[arg(last = true)]
        test_args: Vec<String>,
    },

    /// Print the production file each test covers
    Resolve {
        #[command(flatten)]
        project: ProjectArgs,

        /// Test file paths, optionally with a `:line` suffix
        #[arg(required = true)]
        tests: Vec<String>,

        /// Skip the check that the guessed file exists
        #[arg(long)]
        guess: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Require a test for every production file not allow-listed as untested
    CheckTested {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Require every test file to declare coverage
    CheckUsed {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep the configured complete list in sync with full-coverage declarations
    CheckFullCoverage {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FrameworkArg {
    Minitest,
    Rspec,
}

impl From<FrameworkArg> for Framework {
    fn from(value: FrameworkArg) -> Self {
        match value {
            FrameworkArg::Minitest => Framework::Minitest,
            FrameworkArg::Rspec => Framework::Rspec,
        }
    }
}
