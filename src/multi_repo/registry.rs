//! Registry of repositories taking part in a cross-repository split.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DivisionError, Result};

/// One repository known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "mcp", derive(schemars::JsonSchema))]
pub struct Repository {
    /// Unique name.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Package or module path other code imports it by, if it differs from
    /// the name (e.g. `github.com/acme/core-lib`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Names of repositories this one depends on.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl Repository {
    /// Spellings other code may use to refer to this repository.
    ///
    /// Covers the name with `-` and `_` swapped, the package path, and the
    /// last segment of the package path.
    pub fn reference_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut add = |name: &str| {
            if name.len() >= 3 {
                names.insert(name.to_string());
                names.insert(name.replace('-', "_"));
                names.insert(name.replace('_', "-"));
            }
        };
        add(&self.name);
        if let Some(package) = &self.package {
            add(package);
            if let Some(last) = package.rsplit('/').next() {
                add(last);
            }
        }
        names
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    repositories: Vec<Repository>,
}

/// Ordered set of repositories keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryRegistry {
    repositories: Vec<Repository>,
}

impl RepositoryRegistry {
    /// Builds a registry, rejecting duplicate or empty names.
    pub fn from_repositories(repositories: Vec<Repository>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for repo in &repositories {
            if repo.name.trim().is_empty() {
                return Err(DivisionError::Config(
                    "repository with an empty name in registry".to_string(),
                ));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(DivisionError::Config(format!(
                    "duplicate repository name '{}' in registry",
                    repo.name
                )));
            }
        }
        for repo in &repositories {
            for dep in &repo.dependencies {
                if !seen.contains(dep.as_str()) {
                    warn!(repository = %repo.name, dependency = %dep, "Dependency not in registry");
                }
            }
        }
        Ok(Self { repositories })
    }

    /// Loads a registry file; relative paths resolve against its directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DivisionError::Config(format!("Failed to read registry {}: {e}", path.display()))
        })?;
        let file: RegistryFile = serde_yaml::from_str(&content).map_err(|e| {
            DivisionError::Config(format!("Failed to parse registry {}: {e}", path.display()))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let repositories = file
            .repositories
            .into_iter()
            .map(|mut repo| {
                if repo.path.is_relative() {
                    repo.path = base.join(&repo.path);
                }
                repo
            })
            .collect();

        let registry = Self::from_repositories(repositories)?;
        debug!(
            path = %path.display(),
            repositories = registry.len(),
            "Loaded repository registry"
        );
        Ok(registry)
    }

    /// Looks a repository up by name.
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.name == name)
    }

    /// Repositories in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.iter()
    }

    /// Repository names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.repositories.iter().map(|r| r.name.clone()).collect()
    }

    /// Number of repositories.
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// True when the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Records that `source` depends on `target`. Existing dependencies are
    /// never removed; returns true when the edge is new.
    pub fn add_dependency(&mut self, source: &str, target: &str) -> bool {
        match self.repositories.iter_mut().find(|r| r.name == source) {
            Some(repo) => repo.dependencies.insert(target.to_string()),
            None => false,
        }
    }

    /// Restricts the registry to the named repositories, keeping their order.
    pub fn subset(&self, names: &[String]) -> Result<Self> {
        let mut repositories = Vec::with_capacity(names.len());
        for name in names {
            let repo = self.get(name).ok_or_else(|| {
                DivisionError::InvalidRequest(format!("repository '{name}' is not in the registry"))
            })?;
            repositories.push(repo.clone());
        }
        Ok(Self { repositories })
    }
}
