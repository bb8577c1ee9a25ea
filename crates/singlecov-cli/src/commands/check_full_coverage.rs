use crate::cli::ProjectArgs;
use crate::support::{PAYLOAD_SCHEMA, load_project_or_exit, print_json_or_exit, result_label};
use serde_json::json;
use singlecov_kernel::UsageError;

const CHECK_KIND: &str = "singlecov.check_full_coverage.v1";

pub fn run(project: ProjectArgs, json_output: bool) {
    let project = load_project_or_exit(&project);
    let tests = project.test_files_or_exit();
    let scanner = project.config.usage_scanner(&project.root).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    let failure = match scanner.check_full_coverage(&tests, &project.config.complete) {
        Ok(()) => None,
        Err(err @ UsageError::FullCoverageMismatch { .. }) => Some(err),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    if json_output {
        let (unlisted, stale) = match &failure {
            Some(UsageError::FullCoverageMismatch { unlisted, stale }) => {
                (unlisted.clone(), stale.clone())
            }
            _ => (Vec::new(), Vec::new()),
        };
        print_json_or_exit(
            &json!({
                "schema": PAYLOAD_SCHEMA,
                "checkKind": CHECK_KIND,
                "root": project.display_root(),
                "result": result_label(failure.is_none()),
                "testFiles": tests.len(),
                "unlisted": unlisted,
                "stale": stale,
            }),
            "check-full-coverage",
        );
    } else if let Some(err) = &failure {
        println!("{err}");
        println!("[check-full-coverage] FAIL");
    } else {
        println!(
            "[check-full-coverage] OK (complete={})",
            project.config.complete.len()
        );
    }

    if failure.is_some() {
        std::process::exit(1);
    }
}
