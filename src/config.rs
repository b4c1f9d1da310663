//! Engine configuration.
//!
//! The configuration is read once from `$COMMIT_DIVIDER_CONFIG` or
//! `$HOME/.commit-divider/config.yaml` and passed by reference to every
//! component. A missing file means defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::ChangeType;
use crate::error::{DivisionError, Result};
use crate::proposal::DivisionStrategy;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "COMMIT_DIVIDER_CONFIG";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Change classifier policy.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Semantic grouping thresholds.
    #[serde(default)]
    pub grouping: GroupingConfig,
    /// Defaults applied when a request leaves proposal options unset.
    #[serde(default)]
    pub proposal: ProposalDefaults,
    /// Retry policy for read-only backend calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Classifier rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Rules in the order they are tried. Chore is always the fallback and
    /// is ignored if listed; duplicates are dropped.
    #[serde(default = "default_precedence")]
    pub precedence: Vec<ChangeType>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            precedence: default_precedence(),
        }
    }
}

impl ClassifierConfig {
    /// The precedence list with chore and duplicates removed.
    pub fn effective_precedence(&self) -> Vec<ChangeType> {
        let mut seen = Vec::new();
        for t in &self.precedence {
            if *t != ChangeType::Chore && !seen.contains(t) {
                seen.push(*t);
            }
        }
        seen
    }
}

fn default_precedence() -> Vec<ChangeType> {
    vec![
        ChangeType::Bugfix,
        ChangeType::Feature,
        ChangeType::Docs,
        ChangeType::Test,
        ChangeType::Refactor,
        ChangeType::Style,
        ChangeType::Performance,
    ]
}

/// Thresholds for clustering files into semantic groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Minimum Jaccard overlap of keyword sets for two same-type files to
    /// share a group.
    #[serde(default = "default_min_overlap")]
    pub min_keyword_overlap: f64,
    /// Overlap treated as strong: enables the cohesion bonus and lets test
    /// or docs files join the code group they accompany.
    #[serde(default = "default_strong_overlap")]
    pub strong_keyword_overlap: f64,
    /// Confidence multiplier for strongly cohesive multi-file groups.
    #[serde(default = "default_cohesion_bonus")]
    pub cohesion_bonus: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            min_keyword_overlap: default_min_overlap(),
            strong_keyword_overlap: default_strong_overlap(),
            cohesion_bonus: default_cohesion_bonus(),
        }
    }
}

fn default_min_overlap() -> f64 {
    0.15
}

fn default_strong_overlap() -> f64 {
    0.5
}

fn default_cohesion_bonus() -> f64 {
    1.2
}

/// Proposal options used when a request does not specify them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalDefaults {
    /// Grouping strategy.
    #[serde(default)]
    pub strategy: DivisionStrategy,
    /// Patterns below this confidence are merged into one commit.
    #[serde(default)]
    pub min_confidence: f64,
    /// Upper bound on proposed commits.
    #[serde(default)]
    pub max_commits: Option<usize>,
}

/// Bounded exponential backoff for transient backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, first call included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// Upper bound on any single delay.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_interval_ms() -> u64 {
    100
}

fn default_max_interval_ms() -> u64 {
    2000
}

impl EngineConfig {
    /// Loads configuration from the environment-selected or default path.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::load_from_path(path),
            _ => match Self::default_path() {
                Some(path) => Self::load_from_path(path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Loads configuration from a specific path; a missing file yields defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DivisionError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        serde_yaml::from_str::<Self>(&content)
            .map_err(|e| DivisionError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Returns `$HOME/.commit-divider/config.yaml`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".commit-divider").join("config.yaml"))
    }
}
