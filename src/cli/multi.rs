//! Cross-repository commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use super::{range_or_head, read_proposal};
use crate::tools::{DivisionTools, ExecuteMultiRepoRequest, MultiRepoRequest, ToolRequest};

/// Cross-repository operations.
#[derive(Parser)]
pub struct MultiCommand {
    /// Multi subcommand to execute.
    #[command(subcommand)]
    pub command: MultiSubcommands,
}

/// Multi subcommands.
#[derive(Subcommand)]
pub enum MultiSubcommands {
    /// Analyzes a commit range in every registered repository.
    Analyze(MultiRangeCommand),
    /// Proposes commit groups across repositories, dependencies first.
    Propose(MultiRangeCommand),
    /// Creates the commits of a saved cross-repository proposal.
    Execute(MultiExecuteCommand),
}

/// Options shared by `multi analyze` and `multi propose`.
#[derive(Parser)]
pub struct MultiRangeCommand {
    /// Commit range applied in every repository.
    #[arg(value_name = "COMMIT_RANGE")]
    pub commit_range: Option<String>,

    /// Repository registry file.
    #[arg(long, value_name = "PATH")]
    pub registry: PathBuf,

    /// Grouping strategy: semantic, by-type or by-file.
    #[arg(long)]
    pub strategy: Option<String>,
}

impl MultiRangeCommand {
    fn request(self) -> MultiRepoRequest {
        MultiRepoRequest {
            commit_range: range_or_head(self.commit_range),
            config_path: Some(self.registry.to_string_lossy().into_owned()),
            repositories: None,
            strategy: self.strategy,
        }
    }
}

/// Options of `multi execute`.
#[derive(Parser)]
pub struct MultiExecuteCommand {
    /// Proposal file (YAML or JSON) as printed by `multi propose`.
    #[arg(value_name = "PROPOSAL")]
    pub proposal: PathBuf,

    /// Repository registry file.
    #[arg(long, value_name = "PATH")]
    pub registry: PathBuf,
}

impl MultiCommand {
    /// Executes the multi command.
    pub async fn execute(self, tools: &DivisionTools) -> Result<Value> {
        match self.command {
            MultiSubcommands::Analyze(cmd) => tools
                .dispatch(ToolRequest::AnalyzeMultiRepoCommits(cmd.request()))
                .await
                .context("Failed to analyze repositories"),
            MultiSubcommands::Propose(cmd) => tools
                .dispatch(ToolRequest::ProposeMultiRepoSplit(cmd.request()))
                .await
                .context("Failed to propose cross-repository split"),
            MultiSubcommands::Execute(cmd) => {
                let request = ExecuteMultiRepoRequest {
                    proposal: read_proposal(&cmd.proposal)?,
                    config_path: Some(cmd.registry.to_string_lossy().into_owned()),
                    repositories: None,
                };
                tools
                    .dispatch(ToolRequest::ExecuteMultiRepoSplit(request))
                    .await
                    .context("Failed to execute cross-repository proposal")
            }
        }
    }
}
