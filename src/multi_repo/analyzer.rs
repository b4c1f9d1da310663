//! Concurrent per-repository analysis with a barrier before graphing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::generator::{generate_cross_repo_proposal, CrossRepoProposal};
use super::graph::{CrossRepoDependency, CrossRepoDiff, DependencyGraph};
use super::registry::RepositoryRegistry;
use crate::analysis::AnalysisResult;
use crate::config::EngineConfig;
use crate::diff::FileDiff;
use crate::error::Result;
use crate::git::{RetryingBackend, VcsBackend};
use crate::proposal::{CommitDivisionProposal, DivisionProposalBuilder, ProposalOptions};

/// Outcome of analysing one repository.
#[derive(Debug, Clone)]
pub struct RepositoryAnalysis {
    /// Repository name.
    pub repository: String,
    /// Resolved range start; empty if unknown or the root.
    pub original_commit_id: String,
    /// Resolved range end; empty if unknown.
    pub target_commit_id: String,
    /// Changed files as read from the backend.
    pub files: Vec<FileDiff>,
    /// Analysis of `files`, or the degraded sentinel result.
    pub analysis: AnalysisResult,
    /// Why the analysis degraded, if it did.
    pub error: Option<String>,
}

/// Per-repository analyses, in registry order.
#[derive(Debug, Clone, Default)]
pub struct MultiRepoAnalysis {
    /// One entry per repository.
    pub repositories: Vec<RepositoryAnalysis>,
}

impl MultiRepoAnalysis {
    /// Changes of every repository, including those that degraded.
    pub fn cross_repo_diff(&self) -> CrossRepoDiff {
        CrossRepoDiff {
            repositories: self.repositories.iter().map(|r| r.repository.clone()).collect(),
            changes: self
                .repositories
                .iter()
                .map(|r| (r.repository.clone(), r.files.clone()))
                .collect(),
        }
    }

    /// Repository name to degradation reason.
    pub fn errors(&self) -> BTreeMap<String, String> {
        self.repositories
            .iter()
            .filter_map(|r| r.error.clone().map(|e| (r.repository.clone(), e)))
            .collect()
    }
}

/// Serializable summary of a multi-repository analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiRepoReport {
    /// Analysis per repository.
    pub repositories: BTreeMap<String, AnalysisResult>,
    /// Declared and inferred edges.
    pub dependencies: Vec<CrossRepoDependency>,
    /// Each repository's dependencies once inferred edges are added to the
    /// declared ones.
    pub effective_dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Dependency-first order, when the graph is acyclic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    /// A cycle found in the graph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Vec<String>>,
    /// Repositories whose analysis degraded, with the reason.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

/// Fans analysis out over the repositories of a registry.
#[derive(Clone)]
pub struct MultiRepoAnalyzer {
    builder: Arc<DivisionProposalBuilder>,
    backend: Arc<dyn VcsBackend>,
}

impl MultiRepoAnalyzer {
    /// Creates an analyzer whose backend reads retry transient failures.
    pub fn new(config: &EngineConfig, backend: Arc<dyn VcsBackend>) -> Self {
        Self {
            builder: Arc::new(DivisionProposalBuilder::new(config)),
            backend: Arc::new(RetryingBackend::new(backend, config.retry.clone())),
        }
    }

    /// Analyzes `range` in every repository concurrently.
    ///
    /// Each repository runs on its own blocking task; all of them finish
    /// before this returns. A repository that cannot be read contributes the
    /// sentinel result and an error entry instead of failing the batch.
    pub async fn analyze(&self, registry: &RepositoryRegistry, range: &str) -> MultiRepoAnalysis {
        let tasks = registry.iter().map(|repo| {
            let name = repo.name.clone();
            let path = repo.path.clone();
            let range = range.to_string();
            let builder = Arc::clone(&self.builder);
            let backend = Arc::clone(&self.backend);
            tokio::task::spawn_blocking(move || {
                analyze_repository(&builder, backend.as_ref(), name, path, &range)
            })
        });
        let joined = join_all(tasks).await;

        let repositories = registry
            .iter()
            .zip(joined)
            .map(|(repo, outcome)| match outcome {
                Ok(analysis) => analysis,
                Err(e) => {
                    let reason = format!("analysis task failed: {e}");
                    degraded(&self.builder, repo.name.clone(), &reason)
                }
            })
            .collect::<Vec<_>>();

        let degraded_count = repositories.iter().filter(|r| r.error.is_some()).count();
        info!(
            repositories = repositories.len(),
            degraded = degraded_count,
            "Analyzed repositories"
        );
        MultiRepoAnalysis { repositories }
    }

    /// Analyzes `range` and reports per-repository results plus the graph.
    ///
    /// A cycle is reported in the result rather than failing the call.
    pub async fn report(&self, registry: &RepositoryRegistry, range: &str) -> MultiRepoReport {
        let analysis = self.analyze(registry, range).await;
        let graph = DependencyGraph::build(&analysis.cross_repo_diff(), registry);
        let cycle = graph.find_cycle();
        let order = graph.topological_order().ok();

        let mut effective = registry.clone();
        let inferred = graph.apply_to(&mut effective);
        debug!(inferred, "Added inferred dependencies");

        MultiRepoReport {
            effective_dependencies: effective
                .iter()
                .map(|r| (r.name.clone(), r.dependencies.clone()))
                .collect(),
            errors: analysis.errors(),
            repositories: analysis
                .repositories
                .into_iter()
                .map(|r| (r.repository, r.analysis))
                .collect(),
            dependencies: graph.dependencies().to_vec(),
            order,
            cycle,
        }
    }

    /// Analyzes `range` and merges the per-repository proposals.
    ///
    /// Fails with `CyclicDependency` when the repositories depend on each
    /// other in a cycle.
    pub async fn propose(
        &self,
        registry: &RepositoryRegistry,
        range: &str,
        options: &ProposalOptions,
    ) -> Result<CrossRepoProposal> {
        let analysis = self.analyze(registry, range).await;
        let graph = DependencyGraph::build(&analysis.cross_repo_diff(), registry);
        graph.validate()?;
        let proposals = self.proposals(&analysis, options);
        generate_cross_repo_proposal(&proposals, &graph, analysis.errors())
    }

    /// Builds one proposal per analysed repository, in registry order.
    pub fn proposals(
        &self,
        analysis: &MultiRepoAnalysis,
        options: &ProposalOptions,
    ) -> Vec<(String, CommitDivisionProposal)> {
        analysis
            .repositories
            .iter()
            .map(|r| {
                let proposal = self.builder.build(
                    &r.analysis,
                    &r.original_commit_id,
                    &r.target_commit_id,
                    options,
                    None,
                );
                (r.repository.clone(), proposal)
            })
            .collect()
    }
}

fn analyze_repository(
    builder: &DivisionProposalBuilder,
    backend: &dyn VcsBackend,
    name: String,
    path: PathBuf,
    range: &str,
) -> RepositoryAnalysis {
    match backend.diff_for_commit_range(&path, range) {
        Ok(diff) => {
            debug!(repository = %name, files = diff.files.len(), "Read repository diff");
            let analysis = builder.analyzer().analyze_files(&diff.files, None);
            RepositoryAnalysis {
                repository: name,
                original_commit_id: diff.original_commit_id,
                target_commit_id: diff.target_commit_id,
                files: diff.files,
                analysis,
                error: None,
            }
        }
        Err(e) => {
            warn!(repository = %name, error = %e, "Repository analysis degraded");
            degraded(builder, name, &e.to_string())
        }
    }
}

fn degraded(builder: &DivisionProposalBuilder, name: String, reason: &str) -> RepositoryAnalysis {
    RepositoryAnalysis {
        analysis: builder.analyzer().failed(reason, BTreeSet::new()),
        repository: name,
        original_commit_id: String::new(),
        target_commit_id: String::new(),
        files: Vec::new(),
        error: Some(reason.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::git::backend::{DiffStats, MockVcsBackend, RangeDiff};
    use crate::multi_repo::registry::Repository;
    use std::path::Path;

    fn repo(name: &str, deps: &[&str]) -> Repository {
        Repository {
            name: name.to_string(),
            path: PathBuf::from(format!("/work/{name}")),
            package: None,
            dependencies: deps.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    fn chain() -> RepositoryRegistry {
        RepositoryRegistry::from_repositories(vec![
            repo("frontend-app", &["api-service"]),
            repo("api-service", &["core-lib"]),
            repo("core-lib", &[]),
        ])
        .unwrap()
    }

    fn one_file(repo: &Path) -> RangeDiff {
        let name = repo.file_name().unwrap().to_string_lossy().to_string();
        let path = format!("src/{}.rs", name.replace('-', "_"));
        let diff = format!(
            "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1 +1,2 @@\n x\n+// fix crash in {name}\n"
        );
        RangeDiff {
            files: crate::diff::split_by_file(&diff),
            stats: DiffStats {
                files_changed: 1,
                insertions: 1,
                deletions: 0,
            },
            original_commit_id: format!("{name}-start"),
            target_commit_id: format!("{name}-end"),
        }
    }

    fn analyzer(mock: MockVcsBackend) -> MultiRepoAnalyzer {
        let mut config = EngineConfig::default();
        config.retry.initial_interval_ms = 1;
        config.retry.max_interval_ms = 1;
        MultiRepoAnalyzer::new(&config, Arc::new(mock))
    }

    #[tokio::test]
    async fn chain_is_proposed_dependencies_first() {
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range()
            .times(3)
            .returning(|repo, _| Ok(one_file(repo)));

        let proposal = analyzer(mock)
            .propose(&chain(), "HEAD~1..HEAD", &ProposalOptions::default())
            .await
            .unwrap();

        let position = |name: &str| {
            proposal
                .groups
                .iter()
                .position(|g| g.commits.iter().any(|c| c.repository == name))
                .unwrap()
        };
        assert!(position("core-lib") <= position("api-service"));
        assert!(position("api-service") <= position("frontend-app"));
        assert!(proposal.errors.is_empty());
        assert_eq!(proposal.revisions["api-service"].original_commit_id, "api-service-start");
    }

    #[tokio::test]
    async fn unreadable_repository_degrades_without_aborting() {
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range().returning(|repo, _| {
            if repo.ends_with("api-service") {
                Err(BackendError::RepositoryNotFound(repo.display().to_string()))
            } else {
                Ok(one_file(repo))
            }
        });

        let analysis = analyzer(mock).analyze(&chain(), "HEAD").await;
        assert_eq!(analysis.repositories.len(), 3);
        let errors = analysis.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors["api-service"].contains("Repository not found"));
        assert!(analysis.repositories[1].analysis.is_degraded());
        assert!(!analysis.repositories[2].analysis.is_degraded());
    }

    #[tokio::test]
    async fn report_lists_inferred_dependencies() {
        let registry = RepositoryRegistry::from_repositories(vec![
            repo("web-app", &[]),
            repo("core-lib", &[]),
        ])
        .unwrap();
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range().returning(|repo, _| {
            if repo.ends_with("web-app") {
                let diff = "diff --git a/Cargo.toml b/Cargo.toml\n--- a/Cargo.toml\n+++ b/Cargo.toml\n@@ -1 +1,2 @@\n [dependencies]\n+core-lib = \"1\"\n";
                Ok(RangeDiff {
                    files: crate::diff::split_by_file(diff),
                    stats: DiffStats::default(),
                    original_commit_id: "a".to_string(),
                    target_commit_id: "b".to_string(),
                })
            } else {
                Ok(one_file(repo))
            }
        });

        let report = analyzer(mock).report(&registry, "HEAD").await;
        assert!(report.effective_dependencies["web-app"].contains("core-lib"));
        assert!(report.effective_dependencies["core-lib"].is_empty());
        assert_eq!(report.order.unwrap(), vec!["core-lib", "web-app"]);
        assert!(registry.get("web-app").unwrap().dependencies.is_empty());
    }

    #[tokio::test]
    async fn report_carries_cycles_instead_of_failing() {
        let registry = RepositoryRegistry::from_repositories(vec![
            repo("alpha-svc", &["beta-svc"]),
            repo("beta-svc", &["alpha-svc"]),
        ])
        .unwrap();
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range()
            .returning(|repo, _| Ok(one_file(repo)));
        let analyzer = analyzer(mock);

        let report = analyzer.report(&registry, "HEAD").await;
        assert!(report.cycle.is_some());
        assert!(report.order.is_none());
        assert_eq!(report.repositories.len(), 2);

        let err = analyzer
            .propose(&registry, "HEAD", &ProposalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::DivisionError::CyclicDependency { .. }));
    }
}
