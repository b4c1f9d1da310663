//! The operations exposed to tool-calling clients.
//!
//! Requests are parsed into the closed [`ToolRequest`] enum through a
//! name-to-parser table and dispatched with an exhaustive match. Every
//! failure becomes a [`ToolError`] with a stable code.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::analysis::AnalysisResult;
use crate::config::EngineConfig;
use crate::error::{BackendError, DivisionError};
use crate::execute::{cross_repo_proposal_from_value, execute_cross_repo, execute_division};
use crate::git::{GitBackend, RangeDiff, RetryingBackend, VcsBackend};
use crate::multi_repo::{MultiRepoAnalyzer, Repository, RepositoryRegistry};
use crate::proposal::{
    proposal_from_value, validate_coverage, validate_proposal, CommitDivisionProposal,
    DivisionProposalBuilder, DivisionStrategy, ProposalOptions,
};

/// Stable error codes returned to tool clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorCode {
    /// Parameters missing, mistyped or out of range.
    InvalidParams,
    /// No tool with the requested name.
    UnknownTool,
    /// A supplied proposal is malformed or inconsistent.
    InvalidProposalFormat,
    /// Repositories depend on each other in a cycle.
    CyclicDependency,
    /// The version control backend failed.
    BackendError,
    /// Execution could not start or stopped part-way.
    ExecutionFailed,
    /// Configuration or registry could not be loaded.
    ConfigError,
    /// The server itself failed.
    InternalError,
}

impl ToolErrorCode {
    /// Wire spelling of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "INVALID_PARAMS",
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::InvalidProposalFormat => "INVALID_PROPOSAL_FORMAT",
            Self::CyclicDependency => "CYCLIC_DEPENDENCY",
            Self::BackendError => "BACKEND_ERROR",
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Structured failure of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    /// Machine-readable code.
    pub code: ToolErrorCode,
    /// Human-readable explanation.
    pub message: String,
}

impl ToolError {
    /// Creates an error with the given code.
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The error as a JSON object.
    pub fn to_json(&self) -> Value {
        json!({ "code": self.code.as_str(), "message": self.message })
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<DivisionError> for ToolError {
    fn from(err: DivisionError) -> Self {
        let code = match &err {
            DivisionError::CyclicDependency { .. } => ToolErrorCode::CyclicDependency,
            DivisionError::InvalidProposalFormat(_) => ToolErrorCode::InvalidProposalFormat,
            DivisionError::Backend(_) => ToolErrorCode::BackendError,
            DivisionError::PartialExecution { .. }
            | DivisionError::ExecutionPrecondition(_)
            | DivisionError::DirtyWorkingTree { .. } => ToolErrorCode::ExecutionFailed,
            DivisionError::Config(_) => ToolErrorCode::ConfigError,
            DivisionError::InvalidRequest(_) => ToolErrorCode::InvalidParams,
        };
        Self::new(code, err.to_string())
    }
}

/// Parameters of `analyzeCommitRange`.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCommitRangeRequest {
    /// `A..B` or a single revision.
    pub commit_range: String,
    /// Repository path; the current directory when omitted.
    #[serde(default)]
    pub repo_path: Option<String>,
    /// Free-text description of the change.
    #[serde(default)]
    pub description: Option<String>,
}

/// Parameters of `proposeDivision`.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProposeDivisionRequest {
    /// `A..B` or a single revision.
    pub commit_range: String,
    /// Repository path; the current directory when omitted.
    #[serde(default)]
    pub repo_path: Option<String>,
    /// `semantic`, `by-type` or `by-file`.
    #[serde(default)]
    pub strategy: Option<String>,
    /// Patterns below this confidence are merged.
    #[serde(default)]
    pub min_confidence: Option<f64>,
    /// Upper bound on proposed commits.
    #[serde(default)]
    pub max_commits: Option<usize>,
    /// Free-text description of the change.
    #[serde(default)]
    pub description: Option<String>,
}

/// Parameters of `executeDivision`.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecuteDivisionRequest {
    /// A proposal as returned by `proposeDivision`.
    pub proposal: Value,
    /// Repository path.
    pub repo_path: String,
}

/// Parameters of `automateDivision`.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct AutomateDivisionRequest {
    /// `A..B` or a single revision.
    pub commit_range: String,
    /// Repository path; the current directory when omitted.
    #[serde(default)]
    pub repo_path: Option<String>,
    /// Only propose; defaults to true.
    #[serde(default)]
    pub dry_run: Option<bool>,
    /// Check the proposal before returning or executing; defaults to true.
    #[serde(default)]
    pub validate: Option<bool>,
    /// `semantic`, `by-type` or `by-file`.
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Parameters shared by the multi-repository analyses.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct MultiRepoRequest {
    /// Range applied in every repository.
    pub commit_range: String,
    /// Registry file.
    #[serde(default)]
    pub config_path: Option<String>,
    /// Inline registry, used when no file is given.
    #[serde(default)]
    pub repositories: Option<Vec<Repository>>,
    /// `semantic`, `by-type` or `by-file`.
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Parameters of `executeMultiRepoSplit`.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExecuteMultiRepoRequest {
    /// A proposal as returned by `proposeMultiRepoSplit`.
    pub proposal: Value,
    /// Registry file.
    #[serde(default)]
    pub config_path: Option<String>,
    /// Inline registry, used when no file is given.
    #[serde(default)]
    pub repositories: Option<Vec<Repository>>,
}

/// A parsed tool call.
#[derive(Debug, Clone)]
pub enum ToolRequest {
    /// Analyze one commit range.
    AnalyzeCommitRange(AnalyzeCommitRangeRequest),
    /// Propose a split of one commit range.
    ProposeDivision(ProposeDivisionRequest),
    /// Create the commits of a proposal.
    ExecuteDivision(ExecuteDivisionRequest),
    /// Propose, validate and optionally execute.
    AutomateDivision(AutomateDivisionRequest),
    /// Analyze a range across repositories.
    AnalyzeMultiRepoCommits(MultiRepoRequest),
    /// Propose a coordinated split across repositories.
    ProposeMultiRepoSplit(MultiRepoRequest),
    /// Create the commits of a cross-repository proposal.
    ExecuteMultiRepoSplit(ExecuteMultiRepoRequest),
}

type RequestParser = fn(Value) -> serde_json::Result<ToolRequest>;

/// Tool name to parameter parser.
const TOOLS: &[(&str, RequestParser)] = &[
    ("analyzeCommitRange", |v| {
        serde_json::from_value(v).map(ToolRequest::AnalyzeCommitRange)
    }),
    ("proposeDivision", |v| {
        serde_json::from_value(v).map(ToolRequest::ProposeDivision)
    }),
    ("executeDivision", |v| {
        serde_json::from_value(v).map(ToolRequest::ExecuteDivision)
    }),
    ("automateDivision", |v| {
        serde_json::from_value(v).map(ToolRequest::AutomateDivision)
    }),
    ("analyzeMultiRepoCommits", |v| {
        serde_json::from_value(v).map(ToolRequest::AnalyzeMultiRepoCommits)
    }),
    ("proposeMultiRepoSplit", |v| {
        serde_json::from_value(v).map(ToolRequest::ProposeMultiRepoSplit)
    }),
    ("executeMultiRepoSplit", |v| {
        serde_json::from_value(v).map(ToolRequest::ExecuteMultiRepoSplit)
    }),
];

impl ToolRequest {
    /// Parses the parameters of the named tool.
    pub fn parse(name: &str, params: Value) -> Result<Self, ToolError> {
        let (_, parser) = TOOLS
            .iter()
            .find(|(tool, _)| *tool == name)
            .ok_or_else(|| ToolError::new(ToolErrorCode::UnknownTool, format!("Unknown tool '{name}'")))?;
        let params = if params.is_null() { json!({}) } else { params };
        parser(params).map_err(|e| {
            ToolError::new(ToolErrorCode::InvalidParams, format!("Invalid parameters for {name}: {e}"))
        })
    }

    /// Name of the tool this request is for.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnalyzeCommitRange(_) => "analyzeCommitRange",
            Self::ProposeDivision(_) => "proposeDivision",
            Self::ExecuteDivision(_) => "executeDivision",
            Self::AutomateDivision(_) => "automateDivision",
            Self::AnalyzeMultiRepoCommits(_) => "analyzeMultiRepoCommits",
            Self::ProposeMultiRepoSplit(_) => "proposeMultiRepoSplit",
            Self::ExecuteMultiRepoSplit(_) => "executeMultiRepoSplit",
        }
    }
}

/// Names of every tool, in table order.
pub fn tool_names() -> impl Iterator<Item = &'static str> {
    TOOLS.iter().map(|(name, _)| *name)
}

/// Runs tool requests against a backend.
#[derive(Clone)]
pub struct DivisionTools {
    config: Arc<EngineConfig>,
    builder: Arc<DivisionProposalBuilder>,
    backend: Arc<dyn VcsBackend>,
    writer: Arc<dyn VcsBackend>,
}

impl DivisionTools {
    /// Creates the tool set. Reads go through the retry policy; writes do not.
    pub fn new(config: EngineConfig, backend: Arc<dyn VcsBackend>) -> Self {
        Self {
            builder: Arc::new(DivisionProposalBuilder::new(&config)),
            backend: Arc::new(RetryingBackend::new(Arc::clone(&backend), config.retry.clone())),
            writer: backend,
            config: Arc::new(config),
        }
    }

    /// Tool set over local git repositories.
    pub fn with_git(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(GitBackend::new()))
    }

    /// The configuration the tools run with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses and runs the named tool.
    pub async fn call(&self, name: &str, params: Value) -> Result<Value, ToolError> {
        let request = ToolRequest::parse(name, params)?;
        self.dispatch(request).await
    }

    /// Runs a parsed request.
    pub async fn dispatch(&self, request: ToolRequest) -> Result<Value, ToolError> {
        let name = request.name();
        debug!(tool = name, "Dispatching tool call");
        let result = match request {
            ToolRequest::AnalyzeCommitRange(req) => self.analyze_commit_range(req).await,
            ToolRequest::ProposeDivision(req) => self.propose_division(req).await,
            ToolRequest::ExecuteDivision(req) => self.execute_division(req).await,
            ToolRequest::AutomateDivision(req) => self.automate_division(req).await,
            ToolRequest::AnalyzeMultiRepoCommits(req) => self.analyze_multi_repo(req).await,
            ToolRequest::ProposeMultiRepoSplit(req) => self.propose_multi_repo(req).await,
            ToolRequest::ExecuteMultiRepoSplit(req) => self.execute_multi_repo(req).await,
        };
        if let Err(e) = &result {
            warn!(tool = name, code = e.code.as_str(), error = %e.message, "Tool call failed");
        }
        result
    }

    async fn analyze_commit_range(&self, req: AnalyzeCommitRangeRequest) -> Result<Value, ToolError> {
        let repo = repo_path(req.repo_path.as_deref());
        let (analysis, _) = self
            .read_range(repo, req.commit_range, req.description)
            .await?;
        to_json(&analysis)
    }

    async fn propose_division(&self, req: ProposeDivisionRequest) -> Result<Value, ToolError> {
        let options = self.options(req.strategy.as_deref(), req.min_confidence, req.max_commits)?;
        let repo = repo_path(req.repo_path.as_deref());
        let (analysis, range) = self
            .read_range(repo, req.commit_range, req.description.clone())
            .await?;
        let proposal = self.build(&analysis, range.as_ref(), &options, req.description.as_deref());
        to_json(&proposal)
    }

    async fn execute_division(&self, req: ExecuteDivisionRequest) -> Result<Value, ToolError> {
        let proposal = proposal_from_value(&req.proposal)?;
        let repo = PathBuf::from(req.repo_path);
        let writer = Arc::clone(&self.writer);
        let result = blocking(move || execute_division(writer.as_ref(), &repo, &proposal)).await??;
        to_json(&result)
    }

    async fn automate_division(&self, req: AutomateDivisionRequest) -> Result<Value, ToolError> {
        let options = self.options(req.strategy.as_deref(), None, None)?;
        let repo = repo_path(req.repo_path.as_deref());
        let (analysis, range) = self
            .read_range(repo.clone(), req.commit_range, None)
            .await?;
        let proposal = self.build(&analysis, range.as_ref(), &options, None);

        if req.validate.unwrap_or(true) {
            validate_proposal(&proposal)?;
            if !analysis.is_degraded() {
                validate_coverage(&proposal, &analysis.files)?;
            }
        }

        if req.dry_run.unwrap_or(true) {
            return Ok(json!({ "proposal": to_json(&proposal)?, "executed": false }));
        }

        let writer = Arc::clone(&self.writer);
        let to_execute = proposal.clone();
        let result =
            blocking(move || execute_division(writer.as_ref(), &repo, &to_execute)).await??;
        Ok(json!({
            "proposal": to_json(&proposal)?,
            "executed": true,
            "createdCommits": result.created_commits,
        }))
    }

    async fn analyze_multi_repo(&self, req: MultiRepoRequest) -> Result<Value, ToolError> {
        let registry = load_registry(req.config_path.as_deref(), req.repositories)?;
        let analyzer = MultiRepoAnalyzer::new(&self.config, Arc::clone(&self.writer));
        let report = analyzer.report(&registry, &req.commit_range).await;
        to_json(&report)
    }

    async fn propose_multi_repo(&self, req: MultiRepoRequest) -> Result<Value, ToolError> {
        let options = self.options(req.strategy.as_deref(), None, None)?;
        let registry = load_registry(req.config_path.as_deref(), req.repositories)?;
        let analyzer = MultiRepoAnalyzer::new(&self.config, Arc::clone(&self.writer));
        let proposal = analyzer.propose(&registry, &req.commit_range, &options).await?;
        to_json(&proposal)
    }

    async fn execute_multi_repo(&self, req: ExecuteMultiRepoRequest) -> Result<Value, ToolError> {
        let proposal = cross_repo_proposal_from_value(&req.proposal)?;
        let registry = load_registry(req.config_path.as_deref(), req.repositories)?;
        let writer = Arc::clone(&self.writer);
        let result =
            blocking(move || execute_cross_repo(writer.as_ref(), &registry, &proposal)).await??;
        to_json(&result)
    }

    /// Reads and analyzes a range.
    ///
    /// A missing repository degrades to the sentinel analysis, with the
    /// reason in its diagnostics. Every other backend failure is returned.
    async fn read_range(
        &self,
        repo: PathBuf,
        range: String,
        description: Option<String>,
    ) -> Result<(AnalysisResult, Option<RangeDiff>), ToolError> {
        let backend = Arc::clone(&self.backend);
        let builder = Arc::clone(&self.builder);
        blocking(move || match backend.diff_for_commit_range(&repo, &range) {
            Ok(diff) => {
                let analysis = builder
                    .analyzer()
                    .analyze_files(&diff.files, description.as_deref());
                Ok((analysis, Some(diff)))
            }
            Err(e @ BackendError::RepositoryNotFound(_)) => {
                let reason = e.to_string();
                Ok((builder.analyzer().failed(&reason, BTreeSet::new()), None))
            }
            Err(e) => Err(ToolError::from(DivisionError::from(e))),
        })
        .await?
    }

    fn build(
        &self,
        analysis: &AnalysisResult,
        range: Option<&RangeDiff>,
        options: &ProposalOptions,
        description: Option<&str>,
    ) -> CommitDivisionProposal {
        let (original, target) = range.map_or(("", ""), |r| {
            (r.original_commit_id.as_str(), r.target_commit_id.as_str())
        });
        self.builder
            .build(analysis, original, target, options, description)
    }

    fn options(
        &self,
        strategy: Option<&str>,
        min_confidence: Option<f64>,
        max_commits: Option<usize>,
    ) -> Result<ProposalOptions, ToolError> {
        let mut options = ProposalOptions::from(&self.config.proposal);
        if let Some(strategy) = strategy {
            options.strategy = strategy
                .parse::<DivisionStrategy>()
                .map_err(|e| ToolError::new(ToolErrorCode::InvalidParams, e))?;
        }
        if let Some(min) = min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(ToolError::new(
                    ToolErrorCode::InvalidParams,
                    format!("minConfidence {min} is outside [0, 1]"),
                ));
            }
            options.min_confidence = min;
        }
        if let Some(max) = max_commits {
            if max == 0 {
                return Err(ToolError::new(
                    ToolErrorCode::InvalidParams,
                    "maxCommits must be at least 1",
                ));
            }
            options.max_commits = Some(max);
        }
        Ok(options)
    }
}

fn repo_path(path: Option<&str>) -> PathBuf {
    PathBuf::from(path.filter(|p| !p.is_empty()).unwrap_or("."))
}

fn load_registry(
    config_path: Option<&str>,
    repositories: Option<Vec<Repository>>,
) -> Result<RepositoryRegistry, ToolError> {
    match (config_path, repositories) {
        (Some(path), _) => Ok(RepositoryRegistry::load(path)?),
        (None, Some(repos)) => Ok(RepositoryRegistry::from_repositories(repos)?),
        (None, None) => Err(ToolError::new(
            ToolErrorCode::InvalidParams,
            "either configPath or repositories is required",
        )),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::new(ToolErrorCode::InternalError, e.to_string()))
}

async fn blocking<T, F>(f: F) -> Result<T, ToolError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ToolError::new(ToolErrorCode::InternalError, format!("task failed: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::diff::split_by_file;
    use crate::git::backend::{DiffStats, MockVcsBackend};

    fn tools(mock: MockVcsBackend) -> DivisionTools {
        DivisionTools::new(EngineConfig::default(), Arc::new(mock))
    }

    fn sample_range() -> RangeDiff {
        let diff = "diff --git a/src/parser.rs b/src/parser.rs\n--- a/src/parser.rs\n+++ b/src/parser.rs\n@@ -1 +1,2 @@\n fn parse() {}\n+// fix off-by-one error\n\
diff --git a/docs/guide.md b/docs/guide.md\n--- a/docs/guide.md\n+++ b/docs/guide.md\n@@ -1 +1,2 @@\n # Guide\n+More words.\n";
        RangeDiff {
            files: split_by_file(diff),
            stats: DiffStats {
                files_changed: 2,
                insertions: 2,
                deletions: 0,
            },
            original_commit_id: "a1".to_string(),
            target_commit_id: "b2".to_string(),
        }
    }

    #[test]
    fn table_covers_every_tool() {
        let names: Vec<&str> = tool_names().collect();
        assert_eq!(names.len(), 7);
        for name in names {
            let err = ToolRequest::parse(name, json!({ "unexpected": 1 })).err();
            if let Some(err) = err {
                assert_eq!(err.code, ToolErrorCode::InvalidParams);
            }
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let err = tools(MockVcsBackend::new())
            .call("rebaseEverything", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::UnknownTool);
        assert_eq!(err.to_json()["code"], "UNKNOWN_TOOL");
    }

    #[tokio::test]
    async fn missing_parameters_are_invalid() {
        let err = tools(MockVcsBackend::new())
            .call("proposeDivision", json!({ "strategy": "semantic" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn malformed_proposal_never_reaches_the_backend() {
        let err = tools(MockVcsBackend::new())
            .call(
                "executeDivision",
                json!({ "repoPath": "/repo", "proposal": { "proposedCommits": [] } }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::InvalidProposalFormat);
    }

    #[tokio::test]
    async fn unreadable_repository_degrades_analysis() {
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range()
            .returning(|_, _| Err(BackendError::RepositoryNotFound("/nowhere".to_string())));

        let value = tools(mock)
            .call("proposeDivision", json!({ "commitRange": "HEAD", "repoPath": "/nowhere" }))
            .await
            .unwrap();
        let commits = value["proposedCommits"].as_array().unwrap();
        assert_eq!(commits.len(), 1);
        assert!(commits[0]["message"].as_str().unwrap().starts_with("chore:"));
        assert!(value["confidenceScore"].as_f64().unwrap() <= 0.1);
        assert!(value["diagnostics"][0].as_str().unwrap().contains("/nowhere"));
    }

    #[tokio::test]
    async fn invalid_range_is_a_backend_error() {
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range().times(2).returning(|_, range| {
            Err(BackendError::InvalidRange {
                range: range.to_string(),
                message: "revspec not found".to_string(),
            })
        });
        let tools = tools(mock);

        for name in ["proposeDivision", "automateDivision"] {
            let err = tools
                .call(name, json!({ "commitRange": "bad..range", "repoPath": "/repo" }))
                .await
                .unwrap_err();
            assert_eq!(err.code, ToolErrorCode::BackendError);
            assert!(err.message.contains("bad..range"), "{name}: {}", err.message);
        }
    }

    #[tokio::test]
    async fn proposal_uses_requested_strategy() {
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range()
            .returning(|_, _| Ok(sample_range()));

        let value = tools(mock)
            .call(
                "proposeDivision",
                json!({
                    "commitRange": "a1..b2",
                    "repoPath": "/repo",
                    "strategy": "by-file",
                    "description": "fix parser bug"
                }),
            )
            .await
            .unwrap();
        assert_eq!(value["proposedCommits"].as_array().unwrap().len(), 2);
        assert_eq!(value["totalChanges"], 2);
        assert_eq!(value["originalCommitId"], "a1");
    }

    #[tokio::test]
    async fn automate_defaults_to_dry_run() {
        let mut mock = MockVcsBackend::new();
        mock.expect_diff_for_commit_range()
            .returning(|_, _| Ok(sample_range()));
        mock.expect_create_commit().never();

        let value = tools(mock)
            .call("automateDivision", json!({ "commitRange": "a1..b2", "repoPath": "/repo" }))
            .await
            .unwrap();
        assert_eq!(value["executed"], false);
        assert_eq!(value["proposal"]["totalChanges"], 2);
    }

    #[tokio::test]
    async fn bad_strategy_is_invalid() {
        let err = tools(MockVcsBackend::new())
            .call("automateDivision", json!({ "commitRange": "HEAD", "strategy": "random" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn multi_repo_calls_need_a_registry() {
        let err = tools(MockVcsBackend::new())
            .call("proposeMultiRepoSplit", json!({ "commitRange": "HEAD" }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ToolErrorCode::InvalidParams);
    }

    #[test]
    fn division_errors_map_to_codes() {
        let cycle: ToolError = DivisionError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        }
        .into();
        assert_eq!(cycle.code, ToolErrorCode::CyclicDependency);

        let partial: ToolError = DivisionError::PartialExecution {
            created: vec!["c1".into()],
            source: BackendError::Io {
                path: "x".into(),
                message: "denied".into(),
            },
        }
        .into();
        assert_eq!(partial.code, ToolErrorCode::ExecutionFailed);
        assert!(partial.message.contains("c1"));
    }
}
