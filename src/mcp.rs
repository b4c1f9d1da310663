//! Model Context Protocol adapter over [`DivisionTools`].

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::tools::{
    AnalyzeCommitRangeRequest, AutomateDivisionRequest, DivisionTools, ExecuteDivisionRequest,
    ExecuteMultiRepoRequest, MultiRepoRequest, ProposeDivisionRequest, ToolRequest,
};

/// Tool server state.
#[derive(Clone)]
pub struct DivisionServer {
    tools: DivisionTools,
    tool_router: ToolRouter<Self>,
}

impl DivisionServer {
    /// Wraps a tool set.
    pub fn new(tools: DivisionTools) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }

    async fn run(&self, request: ToolRequest) -> Result<String, String> {
        match self.tools.dispatch(request).await {
            Ok(value) => serde_json::to_string_pretty(&value).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_json().to_string()),
        }
    }
}

#[tool_router]
impl DivisionServer {
    #[tool(
        name = "analyzeCommitRange",
        description = "Analyze the changes of a commit range: files, line counts, diagnostics, dependencies and semantic groups."
    )]
    async fn analyze_commit_range(
        &self,
        Parameters(req): Parameters<AnalyzeCommitRangeRequest>,
    ) -> Result<String, String> {
        self.run(ToolRequest::AnalyzeCommitRange(req)).await
    }

    #[tool(
        name = "proposeDivision",
        description = "Propose how to split a commit range into smaller conventional commits."
    )]
    async fn propose_division(
        &self,
        Parameters(req): Parameters<ProposeDivisionRequest>,
    ) -> Result<String, String> {
        self.run(ToolRequest::ProposeDivision(req)).await
    }

    #[tool(
        name = "executeDivision",
        description = "Create the commits of a proposal. HEAD must be at the proposal's originalCommitId."
    )]
    async fn execute_division(
        &self,
        Parameters(req): Parameters<ExecuteDivisionRequest>,
    ) -> Result<String, String> {
        self.run(ToolRequest::ExecuteDivision(req)).await
    }

    #[tool(
        name = "automateDivision",
        description = "Propose, validate and optionally execute a split. Dry run by default."
    )]
    async fn automate_division(
        &self,
        Parameters(req): Parameters<AutomateDivisionRequest>,
    ) -> Result<String, String> {
        self.run(ToolRequest::AutomateDivision(req)).await
    }

    #[tool(
        name = "analyzeMultiRepoCommits",
        description = "Analyze a commit range in several repositories and report their dependencies."
    )]
    async fn analyze_multi_repo_commits(
        &self,
        Parameters(req): Parameters<MultiRepoRequest>,
    ) -> Result<String, String> {
        self.run(ToolRequest::AnalyzeMultiRepoCommits(req)).await
    }

    #[tool(
        name = "proposeMultiRepoSplit",
        description = "Propose commit groups across repositories, dependencies first."
    )]
    async fn propose_multi_repo_split(
        &self,
        Parameters(req): Parameters<MultiRepoRequest>,
    ) -> Result<String, String> {
        self.run(ToolRequest::ProposeMultiRepoSplit(req)).await
    }

    #[tool(
        name = "executeMultiRepoSplit",
        description = "Create the commits of a cross-repository proposal, group by group."
    )]
    async fn execute_multi_repo_split(
        &self,
        Parameters(req): Parameters<ExecuteMultiRepoRequest>,
    ) -> Result<String, String> {
        self.run(ToolRequest::ExecuteMultiRepoSplit(req)).await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DivisionServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info.name = "commit-divider".into();
        info.server_info.version = crate::VERSION.into();
        info.instructions = Some(
            "Splits commits, or coordinated commits across repositories, into smaller \
             semantic conventional commits. Propose first; execution requires HEAD at the \
             proposal's starting commit."
                .into(),
        );
        info
    }
}
