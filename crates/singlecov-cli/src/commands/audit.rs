use crate::cli::ProjectArgs;
use crate::support::{PAYLOAD_SCHEMA, load_project_or_exit, print_json_or_exit, result_label};
use serde_json::json;
use singlecov_kernel::run_scope::detect;
use singlecov_kernel::{
    AuditReport, CoverageResult, EnforcementSession, FinishedRun, Framework, FsSource,
    ProcessIdentity, ReportOptions, SessionOutcome, load_declarations,
};
use std::collections::BTreeSet;
use std::path::Path;

const CHECK_KIND: &str = "singlecov.audit.v1";

pub struct Args {
    pub project: ProjectArgs,
    pub coverage: String,
    pub declarations: String,
    pub preloaded: Vec<String>,
    pub framework: Framework,
    pub test_status: i32,
    pub report: Option<String>,
    pub lines_only: bool,
    pub no_branches: bool,
    pub test_args: Vec<String>,
    pub json: bool,
}

pub fn run(args: Args) {
    let mut project = load_project_or_exit(&args.project);
    if args.no_branches {
        project.config.branches = false;
    }
    let report_options = report_options(
        &project.root,
        &project.config.report,
        args.report,
        args.lines_only,
    );

    let resolver = project.resolver_or_exit();
    let engine = project.config.diff_engine().unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    let declarations = load_declarations(&args.declarations).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });
    let coverage = CoverageResult::load(&args.coverage).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });
    let preloaded: BTreeSet<String> = args
        .preloaded
        .iter()
        .map(|path| {
            if Path::new(path).is_absolute() {
                path.clone()
            } else {
                resolver.absolute(path).display().to_string()
            }
        })
        .collect();

    let mut session = EnforcementSession::new(resolver, engine, ProcessIdentity)
        .with_report(report_options)
        .max_output(project.config.max_output);
    session.apply(&declarations).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    let run = FinishedRun {
        coverage: &coverage,
        preloaded: &preloaded,
        exit_status: args.test_status,
        scope: detect(args.framework, &args.test_args),
    };
    let source = FsSource::new(&project.root);
    let outcome = session.finish(&run, &source).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });

    if args.json {
        let payload = match &outcome {
            SessionOutcome::Audited(report) => json!({
                "schema": PAYLOAD_SCHEMA,
                "checkKind": CHECK_KIND,
                "root": project.display_root(),
                "result": report.result(),
                "outcome": "audited",
                "audit": report,
            }),
            SessionOutcome::Skipped(reason) => json!({
                "schema": PAYLOAD_SCHEMA,
                "checkKind": CHECK_KIND,
                "root": project.display_root(),
                "result": result_label(true),
                "outcome": "skipped",
                "skip": reason,
                "message": reason.to_string(),
            }),
        };
        print_json_or_exit(&payload, "audit");
    } else {
        match &outcome {
            SessionOutcome::Audited(report) => print_human_summary(report),
            SessionOutcome::Skipped(reason) => println!("[audit] SKIP ({reason})"),
        }
    }

    if !outcome.passed() {
        std::process::exit(1);
    }
}

/// Relative report paths are taken against the project root.
fn report_options(
    root: &Path,
    configured: &Option<ReportOptions>,
    path: Option<String>,
    lines_only: bool,
) -> Option<ReportOptions> {
    let mut options = match (path, configured) {
        (Some(path), Some(configured)) => ReportOptions {
            path: path.into(),
            ..configured.clone()
        },
        (Some(path), None) => ReportOptions::new(path),
        (None, configured) => configured.clone()?,
    };
    if lines_only {
        options.lines_only = true;
    }
    if options.path.is_relative() {
        options.path = root.join(&options.path);
    }
    Some(options)
}

fn print_human_summary(report: &AuditReport) {
    for line in &report.diagnostics {
        println!("{line}");
    }
    if report.pass {
        println!("[audit] OK (checked={})", report.checked);
    } else {
        println!(
            "[audit] FAIL (checked={}, findings={})",
            report.checked,
            report.findings.len()
        );
    }
}
