//! Project file discovery for the repository-wide checks.

use crate::resolver::slash_path;
use std::ffi::OsStr;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, thiserror::Error)]
#[error("failed to walk {root}: {source}")]
pub struct DiscoveryError {
    pub root: String,
    #[source]
    pub source: walkdir::Error,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(OsStr::to_str) == Some(extension)
}

fn is_test_name(path: &Path, extension: &str) -> bool {
    let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
        return false;
    };
    has_extension(path, extension) && (stem.ends_with("_test") || stem.ends_with("_spec"))
}

fn walk(
    root: &Path,
    folders: &[String],
    keep: impl Fn(&Path) -> bool,
) -> Result<Vec<String>, DiscoveryError> {
    let mut found = Vec::new();
    for folder in folders {
        let start = root.join(folder);
        if !start.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&start).into_iter().filter_entry(|e| !is_hidden(e)) {
            let entry = entry.map_err(|source| DiscoveryError {
                root: start.display().to_string(),
                source,
            })?;
            if !entry.file_type().is_file() || !keep(entry.path()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                found.push(slash_path(relative));
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// Source files with `extension` under each production folder.
pub fn production_files(
    root: &Path,
    folders: &[String],
    extension: &str,
) -> Result<Vec<String>, DiscoveryError> {
    walk(root, folders, |path| has_extension(path, extension))
}

/// Test files (`*_test.<ext>`, `*_spec.<ext>`) under each test root.
///
/// `test_*` files are not picked up since helpers share that prefix.
pub fn test_files(
    root: &Path,
    test_roots: &[String],
    extension: &str,
) -> Result<Vec<String>, DiscoveryError> {
    walk(root, test_roots, |path| is_test_name(path, extension))
}
