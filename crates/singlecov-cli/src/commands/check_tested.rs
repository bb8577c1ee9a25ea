use crate::cli::ProjectArgs;
use crate::support::{PAYLOAD_SCHEMA, load_project_or_exit, print_json_or_exit, result_label};
use serde_json::json;
use singlecov_kernel::{CompletenessError, check_completeness};

const CHECK_KIND: &str = "singlecov.check_tested.v1";

pub fn run(project: ProjectArgs, json_output: bool) {
    let project = load_project_or_exit(&project);
    let resolver = project.resolver_or_exit();
    let production = project.production_files_or_exit();
    let tests = project.test_files_or_exit();

    let outcome = check_completeness(&resolver, &production, &tests, &project.config.untested);
    let (stale, missing) = match &outcome {
        Ok(()) => (Vec::new(), Vec::new()),
        Err(CompletenessError::StaleUntested { files }) => (files.clone(), Vec::new()),
        Err(CompletenessError::MissingTests { files }) => (Vec::new(), files.clone()),
        Err(err @ CompletenessError::Resolve(_)) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };
    let ok = outcome.is_ok();

    if json_output {
        print_json_or_exit(
            &json!({
                "schema": PAYLOAD_SCHEMA,
                "checkKind": CHECK_KIND,
                "root": project.display_root(),
                "result": result_label(ok),
                "productionFiles": production.len(),
                "testFiles": tests.len(),
                "staleUntested": stale,
                "missingTests": missing,
            }),
            "check-tested",
        );
    } else if let Err(err) = &outcome {
        println!("{err}");
        println!("[check-tested] FAIL");
    } else {
        println!(
            "[check-tested] OK (production={}, tests={})",
            production.len(),
            tests.len()
        );
    }

    if !ok {
        std::process::exit(1);
    }
}
