//! Configuration-related CLI commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config::EngineConfig;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows the effective engine configuration.
    Show(ShowCommand),
    /// Shows where the configuration is read from.
    Path(PathCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {}

/// Path command options.
#[derive(Parser)]
pub struct PathCommand {}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self, config: &EngineConfig) -> Result<Value> {
        match self.command {
            ConfigSubcommands::Show(show_cmd) => show_cmd.execute(config),
            ConfigSubcommands::Path(path_cmd) => path_cmd.execute(),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self, config: &EngineConfig) -> Result<Value> {
        serde_json::to_value(config).context("Failed to serialize configuration")
    }
}

impl PathCommand {
    /// Executes the path command.
    pub fn execute(self) -> Result<Value> {
        let from_env = std::env::var(crate::config::CONFIG_ENV_VAR)
            .ok()
            .filter(|p| !p.is_empty());
        let path = from_env.or_else(|| {
            EngineConfig::default_path().map(|p| p.to_string_lossy().into_owned())
        });
        Ok(serde_json::json!({ "path": path }))
    }
}
