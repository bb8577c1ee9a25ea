use crate::cli::ProjectArgs;
use crate::support::{PAYLOAD_SCHEMA, load_project_or_exit, print_json_or_exit};
use serde_json::json;

pub fn run(project: ProjectArgs, tests: Vec<String>, guess: bool, json_output: bool) {
    let project = load_project_or_exit(&project);
    let resolver = project.resolver_or_exit();

    let mut resolved = Vec::with_capacity(tests.len());
    for test in &tests {
        let file = if guess {
            resolver.guess(test)
        } else {
            resolver.resolve(test)
        }
        .unwrap_or_else(|err| {
            eprintln!("error: {err}");
            std::process::exit(2);
        });
        resolved.push((test, file));
    }

    if json_output {
        let entries: Vec<_> = resolved
            .iter()
            .map(|(test, file)| json!({"test": test, "file": file}))
            .collect();
        print_json_or_exit(
            &json!({
                "schema": PAYLOAD_SCHEMA,
                "root": project.display_root(),
                "resolved": entries,
            }),
            "resolve",
        );
    } else {
        for (test, file) in &resolved {
            println!("{test} -> {file}");
        }
    }
}
