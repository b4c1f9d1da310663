//! Bounded retry of read-only backend calls.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use super::backend::{
    BackendResult, CommitInfo, FileContent, RangeDiff, VcsBackend, WorkingTreeStatus,
};
use crate::config::RetryConfig;

/// Runs `attempt` until it succeeds, fails permanently, or the attempt budget
/// is spent. Only [`crate::error::BackendError::is_transient`] failures are
/// retried.
pub fn retry_transient<T, F>(config: &RetryConfig, operation: &str, mut attempt: F) -> BackendResult<T>
where
    F: FnMut() -> BackendResult<T>,
{
    let mut backoff = ExponentialBackoff {
        current_interval: Duration::from_millis(config.initial_interval_ms),
        initial_interval: Duration::from_millis(config.initial_interval_ms),
        max_interval: Duration::from_millis(config.max_interval_ms),
        randomization_factor: 0.0,
        max_elapsed_time: None,
        ..Default::default()
    };

    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempts < max_attempts => {
                let wait = backoff.next_backoff().unwrap_or(backoff.max_interval);
                warn!(
                    operation,
                    attempt = attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Transient backend failure, retrying"
                );
                std::thread::sleep(wait);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wraps a backend so that its read-only calls retry transient failures.
///
/// `create_commit` is passed through untouched: a write that may have
/// partially happened is never repeated.
pub struct RetryingBackend {
    inner: Arc<dyn VcsBackend>,
    config: RetryConfig,
}

impl RetryingBackend {
    /// Wraps `inner` with the given policy.
    pub fn new(inner: Arc<dyn VcsBackend>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

impl VcsBackend for RetryingBackend {
    fn diff_for_commit_range(&self, repo: &Path, range: &str) -> BackendResult<RangeDiff> {
        retry_transient(&self.config, "diff_for_commit_range", || {
            self.inner.diff_for_commit_range(repo, range)
        })
    }

    fn commit_info(&self, repo: &Path, commit: &str) -> BackendResult<CommitInfo> {
        retry_transient(&self.config, "commit_info", || {
            self.inner.commit_info(repo, commit)
        })
    }

    fn working_tree_status(&self, repo: &Path) -> BackendResult<WorkingTreeStatus> {
        retry_transient(&self.config, "working_tree_status", || {
            self.inner.working_tree_status(repo)
        })
    }

    fn create_commit(
        &self,
        repo: &Path,
        message: &str,
        changes: &[FileContent],
    ) -> BackendResult<String> {
        self.inner.create_commit(repo, message, changes)
    }

    fn list_files(&self, repo: &Path, commit: &str) -> BackendResult<Vec<String>> {
        retry_transient(&self.config, "list_files", || {
            self.inner.list_files(repo, commit)
        })
    }

    fn read_file(&self, repo: &Path, commit: &str, path: &str) -> BackendResult<Option<Vec<u8>>> {
        retry_transient(&self.config, "read_file", || {
            self.inner.read_file(repo, commit, path)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::git::backend::{DiffStats, MockVcsBackend};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_interval_ms: 1,
            max_interval_ms: 2,
        }
    }

    fn locked() -> BackendError {
        BackendError::Git {
            message: "index is locked".to_string(),
            transient: true,
        }
    }

    fn empty_diff() -> RangeDiff {
        RangeDiff {
            files: Vec::new(),
            stats: DiffStats::default(),
            original_commit_id: "a".to_string(),
            target_commit_id: "b".to_string(),
        }
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut mock = MockVcsBackend::new();
        let mut calls = 0;
        mock.expect_diff_for_commit_range()
            .times(2)
            .returning(move |_, _| {
                calls += 1;
                if calls == 1 {
                    Err(locked())
                } else {
                    Ok(empty_diff())
                }
            });

        let backend = RetryingBackend::new(Arc::new(mock), fast());
        let diff = backend
            .diff_for_commit_range(Path::new("/repo"), "HEAD")
            .unwrap();
        assert_eq!(diff.target_commit_id, "b");
    }

    #[test]
    fn attempts_are_bounded() {
        let mut mock = MockVcsBackend::new();
        mock.expect_list_files()
            .times(3)
            .returning(|_, _| Err(locked()));

        let backend = RetryingBackend::new(Arc::new(mock), fast());
        let err = backend.list_files(Path::new("/repo"), "HEAD").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let mut mock = MockVcsBackend::new();
        mock.expect_commit_info()
            .times(1)
            .returning(|_, _| Err(BackendError::RepositoryNotFound("/repo".to_string())));

        let backend = RetryingBackend::new(Arc::new(mock), fast());
        assert!(backend.commit_info(Path::new("/repo"), "HEAD").is_err());
    }

    #[test]
    fn writes_are_never_retried() {
        let mut mock = MockVcsBackend::new();
        mock.expect_create_commit()
            .times(1)
            .returning(|_, _, _| Err(locked()));

        let backend = RetryingBackend::new(Arc::new(mock), fast());
        assert!(backend
            .create_commit(Path::new("/repo"), "chore: x", &[])
            .is_err());
    }
}
