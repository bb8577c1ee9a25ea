use crate::cli::ProjectArgs;
use serde_json::Value;
use singlecov_kernel::{Resolver, SingleCovConfig, discovery};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const PAYLOAD_SCHEMA: u64 = 1;

/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

/// A loaded project: absolute root plus its configuration.
pub struct Project {
    pub root: PathBuf,
    pub config: SingleCovConfig,
}

impl Project {
    pub fn resolver_or_exit(&self) -> Resolver {
        self.config.resolver(&self.root).unwrap_or_else(|err| {
            eprintln!("error: {err}");
            std::process::exit(2);
        })
    }

    pub fn production_files_or_exit(&self) -> Vec<String> {
        discovery::production_files(
            &self.root,
            &self.config.production_globs,
            &self.config.extension,
        )
        .unwrap_or_else(|err| {
            eprintln!("error: {err}");
            std::process::exit(2);
        })
    }

    pub fn test_files_or_exit(&self) -> Vec<String> {
        discovery::test_files(&self.root, &self.config.test_roots, &self.config.extension)
            .unwrap_or_else(|err| {
                eprintln!("error: {err}");
                std::process::exit(2);
            })
    }

    pub fn display_root(&self) -> String {
        self.root.display().to_string()
    }
}

fn absolute_or_exit(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|err| {
        eprintln!("error: failed to read working directory: {err}");
        std::process::exit(2);
    });
    cwd.join(path)
}

pub fn load_project_or_exit(args: &ProjectArgs) -> Project {
    let base = absolute_or_exit(Path::new(&args.root));
    let config = match &args.config {
        Some(path) => SingleCovConfig::load(absolute_or_exit(Path::new(path))),
        None => SingleCovConfig::discover(&base),
    }
    .unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });
    let root = config.project_root(&base);
    if !root.is_dir() {
        eprintln!("error: project root {} is not a directory", root.display());
        std::process::exit(2);
    }
    debug!(root = %root.display(), "loaded project");
    Project { root, config }
}

pub fn print_json_or_exit(payload: &Value, what: &str) {
    let rendered = serde_json::to_string_pretty(payload).unwrap_or_else(|err| {
        eprintln!("error: failed to render {what} payload: {err}");
        std::process::exit(2);
    });
    println!("{rendered}");
}

pub fn result_label(ok: bool) -> &'static str {
    if ok { "accepted" } else { "rejected" }
}
