//! Error types for division analysis, proposal generation and execution.

use thiserror::Error;

/// Failures reported by a version control backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The repository path does not exist or is not a repository.
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// The commit range or revision could not be resolved.
    #[error("Invalid commit range '{range}': {message}")]
    InvalidRange {
        /// The range as supplied by the caller.
        range: String,
        /// Backend explanation.
        message: String,
    },

    /// A git operation failed.
    #[error("Git operation failed: {message}")]
    Git {
        /// Message from the underlying library.
        message: String,
        /// Whether retrying may succeed (e.g. a locked index).
        transient: bool,
    },

    /// Reading or writing a file in the working tree failed.
    #[error("I/O error on {path}: {message}")]
    Io {
        /// Path that was being accessed.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

impl BackendError {
    /// Returns true when the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Git {
                transient: true,
                ..
            }
        )
    }
}

impl From<git2::Error> for BackendError {
    fn from(err: git2::Error) -> Self {
        let transient = matches!(err.code(), git2::ErrorCode::Locked);
        Self::Git {
            message: err.message().to_string(),
            transient,
        }
    }
}

/// Errors surfaced by the division engine.
///
/// Parse problems and unreadable repositories during analysis never show up
/// here: they degrade into diagnostics and the sentinel error pattern.
#[derive(Error, Debug)]
pub enum DivisionError {
    /// The cross-repository dependency graph contains a cycle.
    #[error("Cyclic dependency between repositories: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// Repository names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },

    /// A caller-supplied proposal is missing fields or is inconsistent.
    #[error("Invalid proposal format: {0}")]
    InvalidProposalFormat(String),

    /// The version control backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Execution stopped after some commits had already been written.
    #[error(
        "Execution failed after creating {} commit(s) [{}]: {source}",
        created.len(),
        created.join(", ")
    )]
    PartialExecution {
        /// Commits written before the failure, oldest first.
        created: Vec<String>,
        /// The failure that stopped execution.
        #[source]
        source: BackendError,
    },

    /// The repository is not in the state the proposal expects.
    #[error("Cannot execute proposal: {0}")]
    ExecutionPrecondition(String),

    /// The working tree or index has uncommitted changes execution would clobber.
    #[error(
        "Working directory of {repository} is not clean ({}); commit or stash changes first",
        paths.join(", ")
    )]
    DirtyWorkingTree {
        /// Repository path or name.
        repository: String,
        /// Offending paths.
        paths: Vec<String>,
    },

    /// Configuration or registry could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request carried invalid parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, DivisionError>;
