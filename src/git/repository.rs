//! git2-backed implementation of [`VcsBackend`].

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use git2::build::{CheckoutBuilder, TreeUpdateBuilder};
use git2::{
    Commit, Diff, DiffFormat, ErrorCode, FileMode, Repository, Signature, Status, StatusOptions,
    TreeWalkMode, TreeWalkResult,
};
use tracing::{debug, info};

use super::backend::{
    BackendResult, CommitInfo, DiffStats, FileContent, RangeDiff, VcsBackend, WorkingTreeStatus,
};
use crate::diff::split_by_file;
use crate::error::BackendError;

/// Fallback identity when the repository has no `user.name`/`user.email`.
const FALLBACK_NAME: &str = "commit-divider";
const FALLBACK_EMAIL: &str = "commit-divider@localhost";

/// Git repository wrapper.
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Opens the repository at `path`.
    pub fn open_at<P: AsRef<Path>>(path: P) -> BackendResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|e| match e.code() {
            ErrorCode::NotFound => BackendError::RepositoryNotFound(path.display().to_string()),
            _ => BackendError::from(e),
        })?;
        Ok(Self { repo })
    }

    /// Access to the underlying git2 repository.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Resolves a revision to a commit.
    pub fn resolve(&self, spec: &str) -> BackendResult<Commit<'_>> {
        let invalid = |e: git2::Error| BackendError::InvalidRange {
            range: spec.to_string(),
            message: e.message().to_string(),
        };
        self.repo
            .revparse_single(spec)
            .map_err(invalid)?
            .peel_to_commit()
            .map_err(invalid)
    }

    /// Resolves `A..B` or a single revision to (start, end) commits.
    ///
    /// A single revision is paired with its first parent; a root commit has
    /// no start.
    pub fn resolve_range(&self, range: &str) -> BackendResult<(Option<Commit<'_>>, Commit<'_>)> {
        if let Some((start, end)) = range.split_once("..") {
            if end.starts_with('.') {
                return Err(BackendError::InvalidRange {
                    range: range.to_string(),
                    message: "symmetric ranges (A...B) are not supported".to_string(),
                });
            }
            let start = if start.is_empty() { "HEAD" } else { start };
            let end = if end.is_empty() { "HEAD" } else { end };
            return Ok((Some(self.resolve(start)?), self.resolve(end)?));
        }

        let commit = self.resolve(range)?;
        let parent = if commit.parent_count() > 0 {
            Some(commit.parent(0)?)
        } else {
            None
        };
        Ok((parent, commit))
    }

    /// Unified diff text and stats between two commits.
    pub fn diff_commits(
        &self,
        start: Option<&Commit<'_>>,
        end: &Commit<'_>,
    ) -> BackendResult<(String, DiffStats)> {
        let old_tree = start.map(Commit::tree).transpose()?;
        let new_tree = end.tree()?;
        let mut diff = self
            .repo
            .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;
        diff.find_similar(None)?;

        let stats = diff.stats()?;
        let stats = DiffStats {
            files_changed: stats.files_changed(),
            insertions: stats.insertions(),
            deletions: stats.deletions(),
        };
        Ok((patch_text(&diff)?, stats))
    }

    fn commit_info(commit: &Commit<'_>) -> BackendResult<CommitInfo> {
        let author = commit.author();
        let when = author.when();
        let offset = FixedOffset::east_opt(when.offset_minutes() * 60)
            .or_else(|| FixedOffset::east_opt(0))
            .ok_or_else(|| BackendError::Git {
                message: "invalid timezone offset".to_string(),
                transient: false,
            })?;
        let timestamp = DateTime::from_timestamp(when.seconds(), 0)
            .ok_or_else(|| BackendError::Git {
                message: format!("invalid commit timestamp {}", when.seconds()),
                transient: false,
            })?
            .with_timezone(&offset);

        Ok(CommitInfo {
            id: commit.id().to_string(),
            author: format!(
                "{} <{}>",
                author.name().unwrap_or("Unknown"),
                author.email().unwrap_or("unknown@example.com")
            ),
            timestamp,
            message: commit.message().unwrap_or("").to_string(),
        })
    }

    fn signature(&self) -> BackendResult<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
        }
    }

    /// Tracked changes and untracked files, ignoring ignored paths.
    pub fn working_tree_status(&self) -> BackendResult<WorkingTreeStatus> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut options))?;

        let mut status = WorkingTreeStatus::default();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let flags = entry.status();
            if flags.is_ignored() || flags == Status::CURRENT {
                continue;
            }
            if flags == Status::WT_NEW {
                status.untracked.push(path.to_string());
            } else {
                status.changed.push(path.to_string());
            }
        }
        Ok(status)
    }

    /// Commits HEAD's tree with `changes` applied.
    ///
    /// The new tree never includes staged or unstaged work; the working tree
    /// and index are checked out to it before HEAD moves.
    fn write_commit(&self, message: &str, changes: &[FileContent]) -> BackendResult<String> {
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let base = match &parent {
            Some(commit) => commit.tree()?,
            None => {
                let empty = self.repo.treebuilder(None)?.write()?;
                self.repo.find_tree(empty)?
            }
        };

        let mut update = TreeUpdateBuilder::new();
        for change in changes {
            let existing = base.get_path(Path::new(&change.path)).ok();
            match &change.content {
                Some(bytes) => {
                    let blob = self.repo.blob(bytes)?;
                    let mode = match existing.map(|e| e.filemode()) {
                        Some(mode) if mode == i32::from(FileMode::BlobExecutable) => {
                            FileMode::BlobExecutable
                        }
                        _ => FileMode::Blob,
                    };
                    update.upsert(change.path.as_str(), blob, mode);
                }
                None => {
                    if existing.is_some() {
                        update.remove(change.path.as_str());
                    }
                }
            }
        }
        let tree_id = update.create_updated(&self.repo, &base)?;
        let tree = self.repo.find_tree(tree_id)?;

        if self.repo.workdir().is_some() {
            self.repo
                .checkout_tree(tree.as_object(), Some(CheckoutBuilder::new().force()))?;
        }

        let signature = self.signature()?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        debug!(commit = %oid, files = changes.len(), "Wrote commit tree");
        Ok(oid.to_string())
    }
}

/// Renders a diff as unified patch text.
fn patch_text(diff: &Diff<'_>) -> BackendResult<String> {
    let mut text = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let content = String::from_utf8_lossy(line.content());
        match line.origin() {
            '+' | '-' | ' ' => {
                text.push(line.origin());
                text.push_str(&content);
            }
            _ => text.push_str(&content),
        }
        true
    })?;

    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// [`VcsBackend`] over local repositories via libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitBackend;

impl GitBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

impl VcsBackend for GitBackend {
    fn diff_for_commit_range(&self, repo: &Path, range: &str) -> BackendResult<RangeDiff> {
        let git = GitRepository::open_at(repo)?;
        let (start, end) = git.resolve_range(range)?;
        let (text, stats) = git.diff_commits(start.as_ref(), &end)?;
        let files = split_by_file(&text);

        debug!(
            repo = %repo.display(),
            range,
            files = files.len(),
            "Loaded range diff"
        );

        Ok(RangeDiff {
            files,
            stats,
            original_commit_id: start.map(|c| c.id().to_string()).unwrap_or_default(),
            target_commit_id: end.id().to_string(),
        })
    }

    fn commit_info(&self, repo: &Path, commit: &str) -> BackendResult<CommitInfo> {
        let git = GitRepository::open_at(repo)?;
        let commit = git.resolve(commit)?;
        GitRepository::commit_info(&commit)
    }

    fn working_tree_status(&self, repo: &Path) -> BackendResult<WorkingTreeStatus> {
        GitRepository::open_at(repo)?.working_tree_status()
    }

    fn create_commit(
        &self,
        repo: &Path,
        message: &str,
        changes: &[FileContent],
    ) -> BackendResult<String> {
        let git = GitRepository::open_at(repo)?;
        let id = git.write_commit(message, changes)?;
        info!(repo = %repo.display(), commit = %id, files = changes.len(), "Created commit");
        Ok(id)
    }

    fn list_files(&self, repo: &Path, commit: &str) -> BackendResult<Vec<String>> {
        let git = GitRepository::open_at(repo)?;
        let tree = git.resolve(commit)?.tree()?;

        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    files.push(format!("{root}{name}"));
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(files)
    }

    fn read_file(&self, repo: &Path, commit: &str, path: &str) -> BackendResult<Option<Vec<u8>>> {
        let git = GitRepository::open_at(repo)?;
        let tree = git.resolve(commit)?.tree()?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = entry.to_object(git.repository())?;
        Ok(object.as_blob().map(|blob| blob.content().to_vec()))
    }
}
