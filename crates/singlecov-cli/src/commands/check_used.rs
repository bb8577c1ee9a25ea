use crate::cli::ProjectArgs;
use crate::support::{PAYLOAD_SCHEMA, load_project_or_exit, print_json_or_exit, result_label};
use serde_json::json;
use singlecov_kernel::UsageError;

const CHECK_KIND: &str = "singlecov.check_used.v1";

pub fn run(project: ProjectArgs, json_output: bool) {
    let project = load_project_or_exit(&project);
    let tests = project.test_files_or_exit();
    let scanner = project.config.usage_scanner(&project.root).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    let undeclared = match scanner.check_used(&tests) {
        Ok(()) => Vec::new(),
        Err(UsageError::Undeclared { tests }) => tests,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };
    let ok = undeclared.is_empty();

    if json_output {
        print_json_or_exit(
            &json!({
                "schema": PAYLOAD_SCHEMA,
                "checkKind": CHECK_KIND,
                "root": project.display_root(),
                "result": result_label(ok),
                "testFiles": tests.len(),
                "undeclared": undeclared,
            }),
            "check-used",
        );
    } else if ok {
        println!("[check-used] OK (tests={})", tests.len());
    } else {
        println!("{}", UsageError::Undeclared { tests: undeclared });
        println!("[check-used] FAIL");
    }

    if !ok {
        std::process::exit(1);
    }
}
