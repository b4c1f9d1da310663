//! Propose command: plans a split of a commit range.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use super::{range_or_head, repo_arg};
use crate::data::{write_file, OutputFormat};
use crate::tools::{DivisionTools, ProposeDivisionRequest, ToolRequest};

/// Propose command options.
#[derive(Parser)]
pub struct ProposeCommand {
    /// Commit range to split (e.g., HEAD~1..HEAD, or a single commit).
    #[arg(value_name = "COMMIT_RANGE")]
    pub commit_range: Option<String>,

    /// Repository to read (defaults to the current directory).
    #[arg(long, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Grouping strategy: semantic, by-type or by-file.
    #[arg(long)]
    pub strategy: Option<String>,

    /// Merge groups whose confidence falls below this value.
    #[arg(long, value_name = "0.0-1.0")]
    pub min_confidence: Option<f64>,

    /// Upper bound on the number of proposed commits.
    #[arg(long)]
    pub max_commits: Option<usize>,

    /// Free-text description of the change, used as classification input.
    #[arg(long)]
    pub description: Option<String>,

    /// Also write the proposal to this file, for `execute`.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl ProposeCommand {
    /// Executes the propose command.
    pub async fn execute(self, tools: &DivisionTools, format: OutputFormat) -> Result<Value> {
        let request = ProposeDivisionRequest {
            commit_range: range_or_head(self.commit_range),
            repo_path: repo_arg(self.repo),
            strategy: self.strategy,
            min_confidence: self.min_confidence,
            max_commits: self.max_commits,
            description: self.description,
        };
        let proposal = tools
            .dispatch(ToolRequest::ProposeDivision(request))
            .await
            .context("Failed to propose division")?;

        if let Some(path) = &self.output {
            write_file(&proposal, path, format)?;
        }
        Ok(proposal)
    }
}
