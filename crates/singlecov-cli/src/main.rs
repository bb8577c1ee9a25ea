//! SingleCov CLI: the `singlecov` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    support::init_tracing(cli.verbose);

    match cli.command {
        Commands::Audit {
            project,
            coverage,
            declarations,
            preloaded,
            framework,
            test_status,
            report,
            lines_only,
            no_branches,
            json,
            test_args,
        } => commands::audit::run(commands::audit::Args {
            project,
            coverage,
            declarations,
            preloaded,
            framework: framework.into(),
            test_status,
            report,
            lines_only,
            no_branches,
            test_args,
            json,
        }),

        Commands::Resolve {
            project,
            tests,
            guess,
            json,
        } => commands::resolve::run(project, tests, guess, json),

        Commands::CheckTested { project, json } => commands::check_tested::run(project, json),

        Commands::CheckUsed { project, json } => commands::check_used::run(project, json),

        Commands::CheckFullCoverage { project, json } => {
            commands::check_full_coverage::run(project, json)
        }
    }
}
