//! Merges per-repository proposals into dependency-ordered commit groups.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::graph::{CrossRepoDependency, DependencyGraph};
use crate::analysis::ChangeType;
use crate::diff::FileDiff;
use crate::error::Result;
use crate::proposal::{CommitDivisionProposal, ProposedCommit};

/// A proposed commit tagged with the repository it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRepoCommit {
    /// Repository name.
    pub repository: String,
    /// Conventional-commit message.
    pub message: String,
    /// Dominant change type.
    pub change_type: ChangeType,
    /// Keywords of the pattern behind the commit.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// File changes.
    pub changes: Vec<FileDiff>,
    /// Confidence of the pattern behind the commit.
    #[serde(default)]
    pub confidence: f64,
}

impl CrossRepoCommit {
    fn new(repository: &str, commit: &ProposedCommit) -> Self {
        Self {
            repository: repository.to_string(),
            message: commit.message.clone(),
            change_type: commit.change_type,
            keywords: commit.keywords.clone(),
            changes: commit.changes.clone(),
            confidence: commit.confidence,
        }
    }
}

/// Commits across repositories that share one theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitGroup {
    /// Group identifier, e.g. `bugfix` or `feature_2`.
    pub name: String,
    /// Shared change type.
    pub change_type: ChangeType,
    /// Member commits, dependencies before dependents.
    pub commits: Vec<CrossRepoCommit>,
}

/// Resolved endpoints of one repository's range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRange {
    /// Range start.
    pub original_commit_id: String,
    /// Range end.
    pub target_commit_id: String,
}

/// Ordered plan for splitting a coordinated set of commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRepoProposal {
    /// Groups in the order they should be committed.
    pub groups: Vec<CommitGroup>,
    /// Mean of the per-repository proposal confidences.
    pub confidence_score: f64,
    /// Edges the ordering honours.
    #[serde(default)]
    pub dependencies: Vec<CrossRepoDependency>,
    /// Range endpoints per repository.
    #[serde(default)]
    pub revisions: BTreeMap<String, RevisionRange>,
    /// Repositories whose analysis degraded, with the reason.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl CrossRepoProposal {
    /// Every repository with at least one commit, in first-appearance order.
    pub fn repositories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.commits.iter())
            .filter(|c| seen.insert(c.repository.as_str()))
            .map(|c| c.repository.as_str())
            .collect()
    }

    /// Commits of one repository, in proposal order.
    pub fn commits_for(&self, repository: &str) -> Vec<&CrossRepoCommit> {
        self.groups
            .iter()
            .flat_map(|g| g.commits.iter())
            .filter(|c| c.repository == repository)
            .collect()
    }
}

/// One theme's commits waiting to be emitted.
struct PendingTheme {
    change_type: ChangeType,
    commits: Vec<CrossRepoCommit>,
}

/// Merges per-repository proposals into a [`CrossRepoProposal`].
///
/// `proposals` must follow the graph's node order. Fails with
/// `CyclicDependency` when the graph has a cycle.
pub fn generate_cross_repo_proposal(
    proposals: &[(String, CommitDivisionProposal)],
    graph: &DependencyGraph,
    errors: BTreeMap<String, String>,
) -> Result<CrossRepoProposal> {
    let order = graph.topological_order()?;
    let rank: BTreeMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let rank_of = |name: &str| rank.get(name).copied().unwrap_or(usize::MAX);

    let by_name: BTreeMap<&str, &CommitDivisionProposal> =
        proposals.iter().map(|(n, p)| (n.as_str(), p)).collect();

    // Themes in order of first appearance, walking repositories dependency-first.
    let mut themes: Vec<PendingTheme> = Vec::new();
    let mut walk: Vec<&str> = order.iter().map(String::as_str).collect();
    for (name, _) in proposals {
        if !rank.contains_key(name.as_str()) {
            walk.push(name);
        }
    }
    for name in &walk {
        let Some(proposal) = by_name.get(name) else {
            continue;
        };
        for commit in &proposal.proposed_commits {
            let entry = CrossRepoCommit::new(name, commit);
            match themes.iter_mut().find(|t| t.change_type == commit.change_type) {
                Some(theme) => theme.commits.push(entry),
                None => themes.push(PendingTheme {
                    change_type: commit.change_type,
                    commits: vec![entry],
                }),
            }
        }
    }

    let mut placed: BTreeSet<String> = BTreeSet::new();
    let mut groups: Vec<CommitGroup> = Vec::new();
    let mut name_counts: BTreeMap<ChangeType, usize> = BTreeMap::new();

    while !themes.is_empty() {
        let (theme_index, members) = next_emission(&themes, graph, &placed);

        let theme = &mut themes[theme_index];
        let (mut emitted, rest): (Vec<_>, Vec<_>) = theme
            .commits
            .drain(..)
            .partition(|c| members.contains(&c.repository));
        theme.commits = rest;
        let change_type = theme.change_type;
        if theme.commits.is_empty() {
            themes.remove(theme_index);
        }

        emitted.sort_by_key(|c| rank_of(&c.repository));
        for commit in &emitted {
            placed.insert(commit.repository.clone());
        }

        let count = name_counts.entry(change_type).or_insert(0);
        *count += 1;
        let name = if *count == 1 {
            change_type.as_str().to_string()
        } else {
            format!("{}_{count}", change_type.as_str())
        };
        groups.push(CommitGroup {
            name,
            change_type,
            commits: emitted,
        });
    }

    let confidence_score = if proposals.is_empty() {
        0.0
    } else {
        let sum: f64 = proposals.iter().map(|(_, p)| p.confidence_score).sum();
        ((sum / proposals.len() as f64) * 1000.0).round() / 1000.0
    };

    let revisions = proposals
        .iter()
        .map(|(name, p)| {
            (
                name.clone(),
                RevisionRange {
                    original_commit_id: p.original_commit_id.clone(),
                    target_commit_id: p.target_commit_id.clone(),
                },
            )
        })
        .collect();

    debug!(
        groups = groups.len(),
        repositories = proposals.len(),
        confidence_score,
        "Generated cross-repository proposal"
    );

    Ok(CrossRepoProposal {
        groups,
        confidence_score,
        dependencies: graph.dependencies().to_vec(),
        revisions,
        errors,
    })
}

/// Picks the next theme to emit and which of its repositories go now.
///
/// A repository may go once every dependency has been placed or goes in the
/// same group. The first theme whose repositories can all go wins; otherwise
/// the first theme with any eligible subset is split.
fn next_emission(
    themes: &[PendingTheme],
    graph: &DependencyGraph,
    placed: &BTreeSet<String>,
) -> (usize, BTreeSet<String>) {
    let mut fallback: Option<(usize, BTreeSet<String>)> = None;

    for (index, theme) in themes.iter().enumerate() {
        let all: BTreeSet<&str> = theme.commits.iter().map(|c| c.repository.as_str()).collect();
        let mut eligible = all.clone();
        loop {
            let blocked: Vec<&str> = eligible
                .iter()
                .copied()
                .filter(|repo| !placed.contains(*repo))
                .filter(|repo| {
                    graph
                        .dependencies_of(repo)
                        .iter()
                        .any(|dep| !placed.contains(*dep) && !eligible.contains(dep))
                })
                .collect();
            if blocked.is_empty() {
                break;
            }
            for repo in blocked {
                eligible.remove(repo);
            }
        }

        if eligible.len() == all.len() {
            return (index, owned(eligible));
        }
        if fallback.is_none() && !eligible.is_empty() {
            fallback = Some((index, owned(eligible)));
        }
    }

    // An acyclic graph always leaves some repository eligible; emitting the
    // first theme whole keeps the loop finite regardless.
    fallback.unwrap_or_else(|| {
        let all = themes[0].commits.iter().map(|c| c.repository.clone()).collect();
        (0, all)
    })
}

fn owned(names: BTreeSet<&str>) -> BTreeSet<String> {
    names.into_iter().map(str::to_string).collect()
}
