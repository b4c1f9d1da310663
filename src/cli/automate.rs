//! Automate command: propose, validate and optionally execute.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use super::{range_or_head, repo_arg};
use crate::tools::{AutomateDivisionRequest, DivisionTools, ToolRequest};

/// Automate command options.
#[derive(Parser)]
pub struct AutomateCommand {
    /// Commit range to split.
    #[arg(value_name = "COMMIT_RANGE")]
    pub commit_range: Option<String>,

    /// Repository to work on (defaults to the current directory).
    #[arg(long, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Create the commits instead of only printing the proposal.
    #[arg(long)]
    pub execute: bool,

    /// Skip proposal validation.
    #[arg(long)]
    pub no_validate: bool,

    /// Grouping strategy: semantic, by-type or by-file.
    #[arg(long)]
    pub strategy: Option<String>,
}

impl AutomateCommand {
    /// Executes the automate command.
    pub async fn execute(self, tools: &DivisionTools) -> Result<Value> {
        let request = AutomateDivisionRequest {
            commit_range: range_or_head(self.commit_range),
            repo_path: repo_arg(self.repo),
            dry_run: Some(!self.execute),
            validate: Some(!self.no_validate),
            strategy: self.strategy,
        };
        tools
            .dispatch(ToolRequest::AutomateDivision(request))
            .await
            .context("Failed to automate division")
    }
}
