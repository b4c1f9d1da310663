//! The version control collaborator the engine reads from and writes to.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::diff::FileDiff;
use crate::error::BackendError;

/// Result alias for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Line statistics of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    /// Files touched.
    pub files_changed: usize,
    /// Lines added.
    pub insertions: usize,
    /// Lines removed.
    pub deletions: usize,
}

/// The diff of a commit range with its resolved endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeDiff {
    /// One slice per changed file.
    pub files: Vec<FileDiff>,
    /// Line statistics.
    pub stats: DiffStats,
    /// Full id of the range start; empty when the range starts at the root.
    pub original_commit_id: String,
    /// Full id of the range end.
    pub target_commit_id: String,
}

/// Metadata of a single commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit id.
    pub id: String,
    /// `Name <email>`.
    pub author: String,
    /// Author timestamp with its original offset.
    pub timestamp: DateTime<FixedOffset>,
    /// Full commit message.
    pub message: String,
}

/// A file's content to record in a new commit; `None` deletes the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    /// Path relative to the repository root.
    pub path: String,
    /// New bytes, or `None` for a deletion.
    pub content: Option<Vec<u8>>,
}

/// Uncommitted state of a working tree. Ignored files are not reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    /// Tracked paths that differ from HEAD in the index or the working tree.
    pub changed: Vec<String>,
    /// Untracked paths.
    pub untracked: Vec<String>,
}

impl WorkingTreeStatus {
    /// True when no tracked path has uncommitted changes.
    pub fn is_clean(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Operations the engine needs from a version control system.
///
/// Calls are synchronous; async callers run them on blocking threads.
#[cfg_attr(test, mockall::automock)]
pub trait VcsBackend: Send + Sync {
    /// Diff between the endpoints of `range` (`A..B`, or a single revision
    /// diffed against its first parent).
    fn diff_for_commit_range(&self, repo: &Path, range: &str) -> BackendResult<RangeDiff>;

    /// Metadata of one commit.
    fn commit_info(&self, repo: &Path, commit: &str) -> BackendResult<CommitInfo>;

    /// Uncommitted changes in the working tree and index.
    fn working_tree_status(&self, repo: &Path) -> BackendResult<WorkingTreeStatus>;

    /// Records a commit on HEAD whose tree is HEAD's tree with `changes`
    /// applied, then brings the index and working tree up to date with it.
    fn create_commit(
        &self,
        repo: &Path,
        message: &str,
        changes: &[FileContent],
    ) -> BackendResult<String>;

    /// Every file path in the tree of `commit`.
    fn list_files(&self, repo: &Path, commit: &str) -> BackendResult<Vec<String>>;

    /// Content of `path` at `commit`, or `None` if it does not exist there.
    fn read_file(&self, repo: &Path, commit: &str, path: &str) -> BackendResult<Option<Vec<u8>>>;
}
