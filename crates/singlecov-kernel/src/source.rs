//! Access to production source text for inline suppression markers.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Provides the lines of a root-relative source file.
///
/// Returning `None` means the text is unavailable; no line is then treated
/// as suppressed. Undecodable bytes are replaced, never treated as unreadable.
pub trait SourceProvider {
    fn lines(&self, file: &str) -> Option<Vec<String>>;
}

/// Reads sources from disk under a project root.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceProvider for FsSource {
    fn lines(&self, file: &str) -> Option<Vec<String>> {
        let path = self.root.join(file);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "source unreadable, uncovered markers ignored"
                );
                return None;
            }
        };
        Some(
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect(),
        )
    }
}

/// In-memory sources, keyed by root-relative path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.insert(file.into(), text.into());
        self
    }
}

impl SourceProvider for MemorySource {
    fn lines(&self, file: &str) -> Option<Vec<String>> {
        self.files
            .get(file)
            .map(|text| text.lines().map(str::to_string).collect())
    }
}
