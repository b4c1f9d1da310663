//! Execute command: creates the commits of a saved proposal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use super::read_proposal;
use crate::tools::{DivisionTools, ExecuteDivisionRequest, ToolRequest};

/// Execute command options.
#[derive(Parser)]
pub struct ExecuteCommand {
    /// Proposal file (YAML or JSON) as written by `propose --output`.
    #[arg(value_name = "PROPOSAL")]
    pub proposal: PathBuf,

    /// Repository to write to (defaults to the current directory).
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub repo: PathBuf,
}

impl ExecuteCommand {
    /// Executes the execute command.
    pub async fn execute(self, tools: &DivisionTools) -> Result<Value> {
        let request = ExecuteDivisionRequest {
            proposal: read_proposal(&self.proposal)?,
            repo_path: self.repo.to_string_lossy().into_owned(),
        };
        tools
            .dispatch(ToolRequest::ExecuteDivision(request))
            .await
            .context("Failed to execute proposal")
    }
}
