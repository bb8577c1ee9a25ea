//! Path correspondence: which production file does a test file cover?
//!
//! Resolution is a pure string transformation over a root-relative path:
//!
//! ```text
//! /repo/plugins/foo/test/models/widget_test.rb:12:in `block'
//!   → strip call-site junk        /repo/plugins/foo/test/models/widget_test.rb
//!   → strip root                  plugins/foo/test/models/widget_test.rb
//!   → split on test/ | spec/      (plugins/foo, models/widget_test.rb)
//!   → classify leading folder     app/models/widget_test.rb
//!   → strip test naming           app/models/widget.rb
//!   → restore subfolder           plugins/foo/app/models/widget.rb
//!   → rewrite hook (optional)
//! ```
//!
//! [`Resolver::resolve`] additionally requires the result to exist on disk.

use crate::error::ResolveError;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

pub const DEFAULT_EXTENSION: &str = "rb";

/// Leading folders that live under `app/` in framework-convention layouts.
pub const DEFAULT_APP_FOLDERS: &[&str] = &[
    "models",
    "serializers",
    "helpers",
    "controllers",
    "mailers",
    "views",
    "jobs",
    "channels",
];

/// Final override applied to every guessed path.
pub trait PathRewriter: Send + Sync {
    fn rewrite(&self, path: &str) -> String;
}

impl<F> PathRewriter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn rewrite(&self, path: &str) -> String {
        self(path)
    }
}

/// Ordered regex substitutions, each replacing its first match.
#[derive(Debug, Clone, Default)]
pub struct RegexRewriter {
    rules: Vec<(Regex, String)>,
}

impl RegexRewriter {
    pub fn new<I, P, R>(rules: I) -> Result<Self, ResolveError>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| {
                compile_regex(pattern.as_ref()).map(|re| (re, replacement.into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PathRewriter for RegexRewriter {
    fn rewrite(&self, path: &str) -> String {
        self.rules
            .iter()
            .fold(path.to_string(), |current, (re, replacement)| {
                re.replacen(&current, 1, replacement.as_str()).into_owned()
            })
    }
}

/// Builder for [`Resolver`].
pub struct ResolverBuilder {
    root: PathBuf,
    working_dir: Option<PathBuf>,
    extension: String,
    app_folders: Vec<String>,
    rewriter: Option<Box<dyn PathRewriter>>,
}

impl ResolverBuilder {
    /// Directory relative caller paths are expanded against.
    /// Defaults to the project root.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Source extension without the leading dot.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn app_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app_folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn rewriter(mut self, rewriter: impl PathRewriter + 'static) -> Self {
        self.rewriter = Some(Box::new(rewriter));
        self
    }

    pub fn build(self) -> Result<Resolver, ResolveError> {
        let root = match std::env::current_dir() {
            Ok(cwd) => normalize_lexically(&absolutize(&self.root, &cwd)),
            Err(_) => normalize_lexically(&self.root),
        };
        let working_dir = match self.working_dir {
            Some(dir) => normalize_lexically(&absolutize(&dir, &root)),
            None => root.clone(),
        };

        let ext = regex::escape(&self.extension);
        let call_site = compile_regex(&format!(r"\.{ext}\b.*"))?;
        let test_suffix = compile_regex(&format!(r"_(?:test|spec)\.{ext}\b.*"))?;
        let app_folder = if self.app_folders.is_empty() {
            None
        } else {
            let alternatives = self
                .app_folders
                .iter()
                .map(|folder| regex::escape(folder))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile_regex(&format!("^(?:{alternatives})/"))?)
        };

        Ok(Resolver {
            root,
            working_dir,
            extension: self.extension,
            rewriter: self.rewriter,
            call_site,
            test_suffix,
            app_folder,
        })
    }
}

/// Convention-based mapper from test-file paths to production-file paths.
pub struct Resolver {
    root: PathBuf,
    working_dir: PathBuf,
    extension: String,
    rewriter: Option<Box<dyn PathRewriter>>,
    call_site: Regex,
    test_suffix: Regex,
    app_folder: Option<Regex>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("root", &self.root)
            .field("working_dir", &self.working_dir)
            .field("extension", &self.extension)
            .field("rewriter", &self.rewriter.is_some())
            .finish()
    }
}

impl Resolver {
    pub fn builder(root: impl Into<PathBuf>) -> ResolverBuilder {
        ResolverBuilder {
            root: root.into(),
            working_dir: None,
            extension: DEFAULT_EXTENSION.to_string(),
            app_folders: DEFAULT_APP_FOLDERS.iter().map(|s| s.to_string()).collect(),
            rewriter: None,
        }
    }

    /// Resolver with every default convention.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ResolveError> {
        Self::builder(root).build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Absolute path of a root-relative file, as keyed in raw coverage.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Guess the covered file without touching the filesystem.
    pub fn guess(&self, caller: &str) -> Result<String, ResolveError> {
        let cleaned = self
            .call_site
            .replacen(caller, 1, format!(".{}", self.extension).as_str())
            .into_owned();

        let expanded = normalize_lexically(&absolutize(Path::new(&cleaned), &self.working_dir));
        let relative = expanded
            .strip_prefix(&self.root)
            .map_err(|_| ResolveError::PathOutsideRoot {
                path: expanded.display().to_string(),
                root: self.root.display().to_string(),
            })?;
        let file = slash_path(relative);

        let Some(marker) = test_marker_re().find(&file) else {
            return Err(ResolveError::NoTestMarker { path: file });
        };
        let subfolder = &file[..marker.start()];
        let remainder = &file[marker.end()..];

        let mut part = if self
            .app_folder
            .as_ref()
            .is_some_and(|re| re.is_match(remainder))
        {
            format!("app/{remainder}")
        } else if remainder.starts_with("lib/") {
            remainder.to_string()
        } else {
            format!("lib/{remainder}")
        };

        if self.test_suffix.is_match(&part) {
            part = self
                .test_suffix
                .replacen(&part, 1, format!(".{}", self.extension).as_str())
                .into_owned();
        } else if part.contains("/test_") {
            part = part.replacen("/test_", "/", 1);
        } else {
            return Err(ResolveError::UnresolvableTestName {
                path: file,
                extension: self.extension.clone(),
            });
        }

        if !subfolder.is_empty() {
            part = format!("{subfolder}/{part}");
        }

        if let Some(rewriter) = &self.rewriter {
            part = rewriter.rewrite(&part);
        }

        if part.starts_with('/') {
            return Err(ResolveError::PathOutsideRoot {
                path: part,
                root: self.root.display().to_string(),
            });
        }

        debug!(caller, covered = %part, "guessed covered file");
        Ok(part)
    }

    /// Guess the covered file and require it to exist under the root.
    pub fn resolve(&self, caller: &str) -> Result<String, ResolveError> {
        let guessed = self.guess(caller)?;
        if !self.root.join(&guessed).exists() {
            return Err(ResolveError::GuessedFileMissing { path: guessed });
        }
        Ok(guessed)
    }

    /// Validate an explicitly declared root-relative file.
    pub fn resolve_explicit(&self, file: &str) -> Result<String, ResolveError> {
        if Path::new(file).is_absolute() {
            return Err(ResolveError::ExplicitPathAbsolute {
                path: file.to_string(),
            });
        }
        if !self.root.join(file).exists() {
            return Err(ResolveError::ExplicitFileMissing {
                path: file.to_string(),
            });
        }
        Ok(file.to_string())
    }

    /// Explicit file when given, otherwise resolve from the caller location.
    pub fn covered_file(&self, explicit: Option<&str>, caller: &str) -> Result<String, ResolveError> {
        match explicit {
            Some(file) => self.resolve_explicit(file),
            None => self.resolve(caller),
        }
    }
}

fn test_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|/)(?:test|spec)/").expect("test marker regex must compile"))
}

fn compile_regex(pattern: &str) -> Result<Regex, ResolveError> {
    Regex::new(pattern).map_err(|err| ResolveError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Resolve `.` and `..` without consulting the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Render a relative path with `/` separators on every platform.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
