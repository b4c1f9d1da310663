//! Turns proposals into real commits.
//!
//! All file contents are read from the target revision before the first
//! commit is written, so backend read failures never leave a half-applied
//! split behind. Writes are not retried.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::diff::{FileChangeKind, FileDiff};
use crate::error::{DivisionError, Result};
use crate::git::{FileContent, VcsBackend};
use crate::multi_repo::{CrossRepoProposal, RepositoryRegistry};
use crate::proposal::{parse_prefix, validate_proposal, CommitDivisionProposal};

/// Commits written for one repository, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Ids of the created commits.
    pub created_commits: Vec<String>,
}

/// Commits written per repository by a cross-repository execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRepoExecution {
    /// Repository name to its created commits.
    pub per_repo_results: BTreeMap<String, ExecutionResult>,
}

/// A commit ready to be written.
struct PreparedCommit {
    message: String,
    contents: Vec<FileContent>,
}

/// Creates the commits of `proposal` in `repo`.
///
/// HEAD must be at the proposal's `originalCommitId`. Commits without
/// changes (the analysis-unavailable placeholder) are skipped.
pub fn execute_division(
    backend: &dyn VcsBackend,
    repo: &Path,
    proposal: &CommitDivisionProposal,
) -> Result<ExecutionResult> {
    validate_proposal(proposal)?;
    check_head(backend, repo, &proposal.original_commit_id)?;
    let all_changes: Vec<&FileDiff> = proposal
        .proposed_commits
        .iter()
        .flat_map(|c| c.changes.iter())
        .collect();
    check_clean(backend, repo, &all_changes)?;

    let prepared = proposal
        .proposed_commits
        .iter()
        .filter(|c| !c.changes.is_empty())
        .map(|c| prepare(backend, repo, &proposal.target_commit_id, &c.message, &c.changes))
        .collect::<Result<Vec<_>>>()?;

    let mut created = Vec::new();
    for commit in prepared {
        match backend.create_commit(repo, &commit.message, &commit.contents) {
            Ok(id) => {
                info!(repo = %repo.display(), commit = %id, subject = %commit.message, "Created commit");
                created.push(id);
            }
            Err(source) => return Err(write_failure(created, source)),
        }
    }

    Ok(ExecutionResult {
        created_commits: created,
    })
}

/// Creates the commits of a cross-repository proposal, group by group.
///
/// Every repository's HEAD is checked before anything is written.
pub fn execute_cross_repo(
    backend: &dyn VcsBackend,
    registry: &RepositoryRegistry,
    proposal: &CrossRepoProposal,
) -> Result<CrossRepoExecution> {
    validate_cross_repo_proposal(proposal)?;

    let mut targets = BTreeMap::new();
    for name in proposal.repositories() {
        let repo = registry.get(name).ok_or_else(|| {
            DivisionError::InvalidRequest(format!("repository '{name}' is not in the registry"))
        })?;
        let revision = proposal.revisions.get(name).ok_or_else(|| {
            DivisionError::InvalidProposalFormat(format!("no revisions recorded for '{name}'"))
        })?;
        check_head(backend, &repo.path, &revision.original_commit_id)?;
        let changes: Vec<&FileDiff> = proposal
            .commits_for(name)
            .into_iter()
            .flat_map(|c| c.changes.iter())
            .collect();
        check_clean(backend, &repo.path, &changes)?;
        targets.insert(name, (repo.path.as_path(), revision.target_commit_id.as_str()));
    }

    let mut prepared = Vec::new();
    for group in &proposal.groups {
        for commit in group.commits.iter().filter(|c| !c.changes.is_empty()) {
            let Some(&(path, target)) = targets.get(commit.repository.as_str()) else {
                continue;
            };
            let ready = prepare(backend, path, target, &commit.message, &commit.changes)?;
            prepared.push((commit.repository.as_str(), path, ready));
        }
    }

    let mut result = CrossRepoExecution::default();
    let mut created = Vec::new();
    for (name, path, commit) in prepared {
        match backend.create_commit(path, &commit.message, &commit.contents) {
            Ok(id) => {
                info!(repository = name, commit = %id, subject = %commit.message, "Created commit");
                created.push(format!("{name}:{id}"));
                result
                    .per_repo_results
                    .entry(name.to_string())
                    .or_default()
                    .created_commits
                    .push(id);
            }
            Err(source) => return Err(write_failure(created, source)),
        }
    }
    Ok(result)
}

/// Deserializes a caller-supplied cross-repository proposal.
pub fn cross_repo_proposal_from_value(value: &Value) -> Result<CrossRepoProposal> {
    if value.get("groups").is_none() {
        return Err(DivisionError::InvalidProposalFormat(
            "missing required field 'groups'".to_string(),
        ));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| DivisionError::InvalidProposalFormat(e.to_string()))
}

/// Checks messages, confidences and per-repository path uniqueness.
pub fn validate_cross_repo_proposal(proposal: &CrossRepoProposal) -> Result<()> {
    let invalid = |msg: String| Err(DivisionError::InvalidProposalFormat(msg));

    if proposal.groups.is_empty() {
        return invalid("proposal has no groups".to_string());
    }
    let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
    for group in &proposal.groups {
        if group.commits.is_empty() {
            return invalid(format!("group '{}' has no commits", group.name));
        }
        for commit in &group.commits {
            if commit.repository.is_empty() {
                return invalid(format!("group '{}' has a commit without a repository", group.name));
            }
            if parse_prefix(&commit.message).is_none() {
                return invalid(format!(
                    "message '{}' has no conventional type prefix",
                    commit.message
                ));
            }
            if !(0.0..=1.0).contains(&commit.confidence) {
                return invalid(format!(
                    "commit confidence {} is outside [0, 1]",
                    commit.confidence
                ));
            }
            for change in &commit.changes {
                if !seen.insert((commit.repository.as_str(), change.path.as_str())) {
                    return invalid(format!(
                        "path '{}' appears in more than one commit of '{}'",
                        change.path, commit.repository
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_head(backend: &dyn VcsBackend, repo: &Path, expected: &str) -> Result<()> {
    if expected.is_empty() {
        return Err(DivisionError::ExecutionPrecondition(format!(
            "{} has no range start to build on",
            repo.display()
        )));
    }
    let head = backend.commit_info(repo, "HEAD")?;
    if head.id != expected && !head.id.starts_with(expected) {
        return Err(DivisionError::ExecutionPrecondition(format!(
            "HEAD of {} is {} but the proposal starts at {expected}",
            repo.display(),
            head.id
        )));
    }
    Ok(())
}

/// Tracked changes always block; untracked files block only where a
/// commit would write over them.
fn check_clean(backend: &dyn VcsBackend, repo: &Path, changes: &[&FileDiff]) -> Result<()> {
    let status = backend.working_tree_status(repo)?;
    let written: BTreeSet<&str> = changes.iter().map(|c| c.path.as_str()).collect();
    let mut blocking: Vec<String> = status.changed;
    blocking.extend(
        status
            .untracked
            .into_iter()
            .filter(|path| written.contains(path.as_str())),
    );
    if blocking.is_empty() {
        return Ok(());
    }
    blocking.sort();
    Err(DivisionError::DirtyWorkingTree {
        repository: repo.display().to_string(),
        paths: blocking,
    })
}

fn prepare(
    backend: &dyn VcsBackend,
    repo: &Path,
    target: &str,
    message: &str,
    changes: &[FileDiff],
) -> Result<PreparedCommit> {
    let mut contents = Vec::with_capacity(changes.len());
    for change in changes {
        if let Some(old_path) = change.parse().old_path {
            if old_path != change.path {
                contents.push(FileContent {
                    path: old_path,
                    content: None,
                });
            }
        }
        let content = match change.change_type {
            FileChangeKind::Delete => None,
            FileChangeKind::Add | FileChangeKind::Modify => {
                let bytes = backend.read_file(repo, target, &change.path)?;
                if bytes.is_none() {
                    return Err(DivisionError::ExecutionPrecondition(format!(
                        "'{}' does not exist at {target}",
                        change.path
                    )));
                }
                bytes
            }
        };
        contents.push(FileContent {
            path: change.path.clone(),
            content,
        });
    }
    debug!(repo = %repo.display(), files = contents.len(), subject = message, "Prepared commit");
    Ok(PreparedCommit {
        message: message.to_string(),
        contents,
    })
}

fn write_failure(created: Vec<String>, source: crate::error::BackendError) -> DivisionError {
    if created.is_empty() {
        DivisionError::Backend(source)
    } else {
        DivisionError::PartialExecution { created, source }
    }
}
