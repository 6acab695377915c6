//! File-level change detection between revisions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::ChangeDetectionError;

/// Files touched between two revisions, relative to the analyzed root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Distinct paths across all three sets.
    pub fn all_files(&self) -> BTreeSet<&str> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.deleted)
            .map(String::as_str)
            .collect()
    }

    /// Added and modified paths, the files that need extraction.
    pub fn changed_files(&self) -> BTreeSet<&str> {
        self.added
            .iter()
            .chain(&self.modified)
            .map(String::as_str)
            .collect()
    }

    /// Only the paths ending in `.{extension}`.
    pub fn filtered(&self, extension: &str) -> ChangeSet {
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        let keep = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.iter().filter(|path| path.ends_with(&suffix)).cloned().collect()
        };
        ChangeSet {
            added: keep(&self.added),
            modified: keep(&self.modified),
            deleted: keep(&self.deleted),
        }
    }
}

/// Opaque description of the current revision, used as the "last updated"
/// stamp of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub revision: String,
    pub author: String,
    pub date: String,
    pub summary: String,
}

pub trait ChangeDetector {
    fn changes(&self, from_revision: &str, to_revision: &str) -> Result<ChangeSet, ChangeDetectionError>;

    /// Identifier of the current revision, `None` when there is none yet.
    fn latest_revision(&self) -> Result<Option<String>, ChangeDetectionError>;

    fn commit_info(&self) -> Result<CommitInfo, ChangeDetectionError>;
}

/// [`ChangeDetector`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitChangeDetector {
    repo_path: PathBuf,
}

impl GitChangeDetector {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn git(&self, args: &[&str]) -> Result<Output, ChangeDetectionError> {
        Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args(args)
            .output()
            .map_err(ChangeDetectionError::Spawn)
    }

    fn git_stdout(&self, args: &[&str]) -> Result<String, ChangeDetectionError> {
        let output = self.git(args)?;
        if !output.status.success() {
            return Err(ChangeDetectionError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ChangeDetector for GitChangeDetector {
    fn changes(&self, from_revision: &str, to_revision: &str) -> Result<ChangeSet, ChangeDetectionError> {
        let stdout = self.git_stdout(&[
            "diff",
            "--name-status",
            "-z",
            "--find-renames",
            "--relative",
            from_revision,
            to_revision,
            "--",
        ])?;
        parse_name_status(&stdout)
    }

    fn latest_revision(&self) -> Result<Option<String>, ChangeDetectionError> {
        let output = self.git(&["rev-parse", "--verify", "--quiet", "HEAD"])?;
        if output.status.success() {
            let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok((!revision.is_empty()).then_some(revision));
        }
        // `--verify --quiet` exits with 1 when HEAD does not name a commit yet.
        if output.status.code() == Some(1) {
            return Ok(None);
        }
        Err(ChangeDetectionError::CommandFailed {
            command: "git rev-parse --verify HEAD".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn commit_info(&self) -> Result<CommitInfo, ChangeDetectionError> {
        let stdout = self.git_stdout(&["log", "-1", "--format=%H%x1f%an%x1f%aI%x1f%s"])?;
        let mut fields = stdout.trim_end_matches('\n').split('\u{1f}');
        let mut next = |name: &str| {
            fields
                .next()
                .map(str::to_string)
                .ok_or_else(|| ChangeDetectionError::InvalidOutput(format!("missing {name} in git log")))
        };
        Ok(CommitInfo {
            revision: next("hash")?,
            author: next("author")?,
            date: next("date")?,
            summary: next("subject")?,
        })
    }
}

/// Parse `git diff --name-status -z` output: NUL-terminated fields, a
/// status followed by one path, or two for renames and copies. Paths are
/// taken verbatim. A rename is a deletion of the old path plus an addition
/// of the new one; a copy is an addition.
pub fn parse_name_status(output: &str) -> Result<ChangeSet, ChangeDetectionError> {
    let mut changes = ChangeSet::default();
    let mut fields = output.split('\0').filter(|field| !field.is_empty());

    while let Some(status) = fields.next() {
        let status = status.trim();
        let mut path = || {
            fields
                .next()
                .map(str::to_string)
                .ok_or_else(|| ChangeDetectionError::InvalidOutput(format!("{status} without a path")))
        };

        match status.chars().next() {
            Some('A') => {
                changes.added.insert(path()?);
            }
            Some('M') | Some('T') => {
                changes.modified.insert(path()?);
            }
            Some('D') => {
                changes.deleted.insert(path()?);
            }
            Some('R') => {
                changes.deleted.insert(path()?);
                changes.added.insert(path()?);
            }
            Some('C') => {
                path()?;
                changes.added.insert(path()?);
            }
            _ => return Err(ChangeDetectionError::InvalidOutput(status.to_string())),
        }
    }

    Ok(changes)
}
