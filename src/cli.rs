//! CLI interface for commit-divider.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::data::{render, OutputFormat};
use crate::tools::DivisionTools;

pub mod analyze;
pub mod automate;
pub mod config;
pub mod execute;
pub mod multi;
pub mod propose;

/// commit-divider: splits commits into smaller semantic commits.
#[derive(Parser)]
#[command(name = "commit-divider")]
#[command(
    about = "Proposes how to split a commit, or commits across repositories, into smaller semantic commits",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Engine configuration file (defaults to $COMMIT_DIVIDER_CONFIG, then
    /// ~/.commit-divider/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Analyzes the changes of a commit range.
    Analyze(analyze::AnalyzeCommand),
    /// Proposes how to split a commit range.
    Propose(propose::ProposeCommand),
    /// Creates the commits of a saved proposal.
    Execute(execute::ExecuteCommand),
    /// Proposes, validates and optionally executes in one step.
    Automate(automate::AutomateCommand),
    /// Cross-repository operations.
    Multi(multi::MultiCommand),
    /// Configuration operations.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => EngineConfig::load_from_path(path),
            None => EngineConfig::load(),
        }
        .context("Failed to load configuration")?;

        let tools = DivisionTools::with_git(config);
        let output = match self.command {
            Commands::Analyze(cmd) => cmd.execute(&tools).await?,
            Commands::Propose(cmd) => cmd.execute(&tools, self.format).await?,
            Commands::Execute(cmd) => cmd.execute(&tools).await?,
            Commands::Automate(cmd) => cmd.execute(&tools).await?,
            Commands::Multi(cmd) => cmd.execute(&tools).await?,
            Commands::Config(cmd) => cmd.execute(tools.config())?,
        };

        print!("{}", render(&output, self.format)?);
        Ok(())
    }
}

/// Commit range argument shared by the range commands.
pub(crate) fn range_or_head(range: Option<String>) -> String {
    range.unwrap_or_else(|| "HEAD".to_string())
}

/// Repository path argument as the tool layer expects it.
pub(crate) fn repo_arg(path: Option<PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}

/// Reads a proposal file (YAML or JSON) into a JSON value.
pub(crate) fn read_proposal(path: &std::path::Path) -> Result<Value> {
    crate::data::read_structured_file(path)
        .with_context(|| format!("Failed to load proposal from {}", path.display()))
}
