//! Version control backend: trait, git2 implementation and retry wrapper.

pub mod backend;
pub mod repository;
pub mod retry;

pub use backend::{
    BackendResult, CommitInfo, DiffStats, FileContent, RangeDiff, VcsBackend, WorkingTreeStatus,
};
pub use repository::{GitBackend, GitRepository};
pub use retry::{retry_transient, RetryingBackend};
