use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Project-relative, forward-slash path used as the module id.
    pub module_id: String,
}

/// Enumerates source files under a root.
///
/// A file is kept when it matches an include glob, matches no exclude glob
/// and carries the source extension. Globs match project-relative paths.
pub struct FileScanner {
    include: GlobSet,
    include_all: bool,
    exclude: GlobSet,
    extension: String,
}

impl FileScanner {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S], extension: &str) -> Result<Self> {
        Ok(Self {
            include: build_glob_set(include)?,
            include_all: include.is_empty(),
            exclude: build_glob_set(exclude)?,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    /// Files under `root`, sorted by module id.
    pub fn scan_directory(&self, root: &Path) -> Result<Vec<FileInfo>> {
        if !root.is_dir() {
            return Err(Error::RootNotFound(root.to_path_buf()));
        }

        let entries: Vec<_> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
                    tracing::warn!(path = %path, error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .collect();

        let mut files: Vec<FileInfo> = entries
            .par_iter()
            .filter_map(|entry| {
                let path = entry.path();
                let module_id = module_id(root, path);
                self.accepts(&module_id).then(|| FileInfo {
                    path: path.to_path_buf(),
                    module_id,
                })
            })
            .collect();

        files.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        Ok(files)
    }

    /// Whether a project-relative path passes the extension and glob filters.
    pub fn accepts(&self, relative: &str) -> bool {
        self.has_source_extension(relative)
            && (self.include_all || self.include.is_match(relative))
            && !self.exclude.is_match(relative)
    }

    /// Keep the given project-relative `files` that exist under `root` and
    /// pass the filters, sorted and deduplicated.
    pub fn select_files<S: AsRef<str>>(&self, root: &Path, files: &[S]) -> Vec<FileInfo> {
        let mut selected: Vec<FileInfo> = files
            .iter()
            .filter_map(|file| {
                let id = module_id(Path::new(""), Path::new(file.as_ref()));
                let path = root.join(&id);
                if !self.accepts(&id) || !path.is_file() {
                    tracing::debug!(file = %id, "skipping file outside the source set");
                    return None;
                }
                Some(FileInfo { path, module_id: id })
            })
            .collect();
        selected.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        selected.dedup_by(|a, b| a.module_id == b.module_id);
        selected
    }

    pub fn has_source_extension(&self, relative: &str) -> bool {
        Path::new(relative)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }
}

fn build_glob_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern.as_ref())?);
    }
    Ok(builder.build()?)
}

/// Node id for `path`: relative to `root` when inside it, otherwise the full
/// path. Separators are normalized to `/` and `.` components dropped.
pub fn module_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;

    for component in relative.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::Prefix(prefix) => {
                parts.push(prefix.as_os_str().to_string_lossy().into_owned())
            }
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}
