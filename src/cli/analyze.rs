//! Analyze command: reports what changed in a commit range.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use super::{range_or_head, repo_arg};
use crate::tools::{AnalyzeCommitRangeRequest, DivisionTools, ToolRequest};

/// Analyze command options.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// Commit range to analyze (e.g., HEAD~3..HEAD, abc123..def456).
    #[arg(value_name = "COMMIT_RANGE")]
    pub commit_range: Option<String>,

    /// Repository to read (defaults to the current directory).
    #[arg(long, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Free-text description of the change, used as classification input.
    #[arg(long)]
    pub description: Option<String>,
}

impl AnalyzeCommand {
    /// Executes the analyze command.
    pub async fn execute(self, tools: &DivisionTools) -> Result<Value> {
        let request = AnalyzeCommitRangeRequest {
            commit_range: range_or_head(self.commit_range),
            repo_path: repo_arg(self.repo),
            description: self.description,
        };
        tools
            .dispatch(ToolRequest::AnalyzeCommitRange(request))
            .await
            .context("Failed to analyze commit range")
    }
}
