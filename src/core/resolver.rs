use dashmap::DashMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ResolutionError;

/// Extensions probed after the source file and the package `__init__`.
const BINARY_EXTENSIONS: [&str; 3] = ["pyd", "so", "pyc"];

/// Outcome of resolving one import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Path of the file that satisfies the import.
    Resolved(PathBuf),
    /// Standard library or third-party module.
    External,
    /// Looks like a project module but no file matches.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolveKey {
    module: String,
    source: Option<PathBuf>,
    level: usize,
}

/// Maps import statements to files on disk.
///
/// Results are memoized for the lifetime of the resolver, so one resolver
/// belongs to one extraction run. Lookups are safe from many threads.
#[derive(Debug)]
pub struct ImportPathResolver {
    /// Project root first, then the extra search roots.
    roots: Vec<PathBuf>,
    source_extension: String,
    cache: DashMap<ResolveKey, Resolution>,
}

impl ImportPathResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![project_root.into()],
            source_extension: "py".to_string(),
            cache: DashMap::new(),
        }
    }

    pub fn with_search_roots<I>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for root in roots {
            if !self.roots.contains(&root) {
                self.roots.push(root);
            }
        }
        self
    }

    pub fn with_source_extension(mut self, extension: &str) -> Self {
        self.source_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `module` imported from `source_file` with `level` leading dots.
    ///
    /// A missing file is a normal [`Resolution::External`] or
    /// [`Resolution::Unresolved`] outcome. Only filesystem failures and a
    /// relative import without a source file are errors; errors are not cached.
    pub fn resolve(
        &self,
        module: &str,
        source_file: Option<&Path>,
        level: usize,
    ) -> Result<Resolution, ResolutionError> {
        let key = ResolveKey {
            module: module.to_string(),
            source: source_file.map(Path::to_path_buf),
            level,
        };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let found = if level > 0 {
            let source = source_file.ok_or_else(|| ResolutionError::MissingSourceFile {
                module: specifier(module, level),
            })?;
            let base = relative_base(source, level);
            self.find_module_path(&join_module(&base, module))?
        } else {
            self.find_absolute(module)?
        };

        let resolution = match found {
            Some(path) => Resolution::Resolved(path),
            None if is_external(module, level) => Resolution::External,
            None => Resolution::Unresolved,
        };

        self.cache.insert(key, resolution.clone());
        Ok(resolution)
    }

    fn find_absolute(&self, module: &str) -> Result<Option<PathBuf>, ResolutionError> {
        if module.is_empty() {
            return Ok(None);
        }
        for root in &self.roots {
            if let Some(path) = self.find_module_path(&join_module(root, module))? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Probe `<base>.py`, `<base>/__init__.py`, then binary modules.
    fn find_module_path(&self, base: &Path) -> Result<Option<PathBuf>, ResolutionError> {
        let source = with_extension_suffix(base, &self.source_extension);
        if is_file(&source)? {
            return Ok(Some(source));
        }

        let package = base.join(format!("__init__.{}", self.source_extension));
        if is_file(&package)? {
            return Ok(Some(package));
        }

        for extension in BINARY_EXTENSIONS {
            let binary = with_extension_suffix(base, extension);
            if is_file(&binary)? {
                return Ok(Some(binary));
            }
        }

        Ok(None)
    }
}

/// Import text as written: leading dots followed by the module path.
pub fn specifier(module: &str, level: usize) -> String {
    let mut text = ".".repeat(level);
    text.push_str(module);
    text
}

/// An import that resolves nowhere is external when it is a bare top-level
/// name or uses relative syntax. A dotted absolute path is unresolved.
pub fn is_external(module: &str, level: usize) -> bool {
    let text = specifier(module, level);
    !text.contains('.') || text.starts_with('.')
}

/// Directory a relative import of `level` dots starts from.
fn relative_base(source_file: &Path, level: usize) -> PathBuf {
    let mut base = source_file.parent().unwrap_or(Path::new("")).to_path_buf();
    for _ in 1..level {
        if !base.pop() {
            break;
        }
    }
    base
}

fn join_module(base: &Path, module: &str) -> PathBuf {
    module
        .split('.')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |path, part| path.join(part))
}

/// `pkg/mod` + `py` -> `pkg/mod.py`, even when `mod` contains dots.
fn with_extension_suffix(base: &Path, extension: &str) -> PathBuf {
    let mut raw = OsString::from(base.as_os_str());
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

fn is_file(path: &Path) -> Result<bool, ResolutionError> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            Ok(false)
        }
        Err(source) => Err(ResolutionError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
