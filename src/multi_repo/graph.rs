//! Dependency graph between the repositories of a cross-repository diff.
//!
//! Nodes live in an arena indexed by their position in the diff's
//! repository list; edges point from a repository to the ones it depends on.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::registry::RepositoryRegistry;
use crate::analysis::dependencies::extract_dependencies;
use crate::diff::{DiffLineKind, FileDiff, ParsedFileDiff};
use crate::error::{DivisionError, Result};

/// Per-repository changes of one cross-repository split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRepoDiff {
    /// Repository names, in the order ties are broken.
    pub repositories: Vec<String>,
    /// Repository name to its changed files.
    pub changes: BTreeMap<String, Vec<FileDiff>>,
}

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Listed in the registry.
    Declared,
    /// Found in the changed content.
    Inferred,
}

/// `source` depends on `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossRepoDependency {
    /// Dependent repository.
    pub source: String,
    /// Repository depended upon.
    pub target: String,
    /// Declared or inferred.
    pub kind: DependencyKind,
    /// What established the edge.
    pub evidence: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed dependency graph over the repositories of a [`CrossRepoDiff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    edges: Vec<Vec<usize>>,
    dependencies: Vec<CrossRepoDependency>,
}

impl DependencyGraph {
    /// Builds the graph from declared dependencies plus references found in
    /// each repository's added and context lines.
    pub fn build(diff: &CrossRepoDiff, registry: &RepositoryRegistry) -> Self {
        let nodes: Vec<String> = diff.repositories.clone();
        let index: BTreeMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let mut graph = Self {
            edges: vec![Vec::new(); nodes.len()],
            nodes: nodes.clone(),
            dependencies: Vec::new(),
        };

        for (s, source) in nodes.iter().enumerate() {
            let Some(repo) = registry.get(source) else {
                warn!(repository = %source, "Repository missing from registry");
                continue;
            };
            for target in &repo.dependencies {
                if let Some(&t) = index.get(target.as_str()) {
                    graph.add_edge(s, t, DependencyKind::Declared, "declared in registry".to_string());
                }
            }
        }

        let matchers: Vec<Option<(Regex, BTreeSet<String>)>> = nodes
            .iter()
            .map(|name| registry.get(name).and_then(|r| reference_matcher(&r.reference_names())))
            .collect();

        for (s, source) in nodes.iter().enumerate() {
            let parsed: Vec<ParsedFileDiff> = diff
                .changes
                .get(source)
                .map(|files| files.iter().map(FileDiff::parse).collect())
                .unwrap_or_default();

            for (t, matcher) in matchers.iter().enumerate() {
                if s == t || graph.edges[s].contains(&t) {
                    continue;
                }
                let Some((regex, names)) = matcher else {
                    continue;
                };
                if let Some(evidence) = find_reference(&parsed, regex, names) {
                    graph.add_edge(s, t, DependencyKind::Inferred, evidence);
                }
            }
        }

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.dependencies.len(),
            "Built dependency graph"
        );
        graph
    }

    fn add_edge(&mut self, source: usize, target: usize, kind: DependencyKind, evidence: String) {
        if self.edges[source].contains(&target) {
            return;
        }
        self.edges[source].push(target);
        self.edges[source].sort_unstable();
        self.dependencies.push(CrossRepoDependency {
            source: self.nodes[source].clone(),
            target: self.nodes[target].clone(),
            kind,
            evidence,
        });
    }

    /// Repository names in input order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Every edge, declared ones first.
    pub fn dependencies(&self) -> &[CrossRepoDependency] {
        &self.dependencies
    }

    /// Names `name` depends on directly.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.position(name)
            .map(|i| self.edges[i].iter().map(|&t| self.nodes[t].as_str()).collect())
            .unwrap_or_default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == name)
    }

    /// Finds a cycle with an iterative three-color depth-first search.
    ///
    /// Returns the names along the cycle with the first repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut color = vec![Color::White; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if color[start] != Color::White {
                continue;
            }
            // (node, index of the next edge to follow)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            color[start] = Color::Gray;

            while let Some(frame) = stack.last_mut() {
                let (node, next_edge) = *frame;
                if next_edge < self.edges[node].len() {
                    frame.1 += 1;
                    let next = self.edges[node][next_edge];
                    match color[next] {
                        Color::White => {
                            color[next] = Color::Gray;
                            stack.push((next, 0));
                        }
                        Color::Gray => {
                            let from = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                            let mut cycle: Vec<String> = stack[from..]
                                .iter()
                                .map(|(n, _)| self.nodes[*n].clone())
                                .collect();
                            cycle.push(self.nodes[next].clone());
                            return Some(cycle);
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        None
    }

    /// Fails with [`DivisionError::CyclicDependency`] if the graph has a cycle.
    pub fn validate(&self) -> Result<()> {
        match self.find_cycle() {
            Some(cycle) => Err(DivisionError::CyclicDependency { cycle }),
            None => Ok(()),
        }
    }

    /// Dependencies before dependents; unrelated repositories keep input order.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        self.validate()?;

        let n = self.nodes.len();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let ready = (0..n)
                .find(|&i| !placed[i] && self.edges[i].iter().all(|&t| placed[t]));
            match ready {
                Some(i) => {
                    placed[i] = true;
                    order.push(self.nodes[i].clone());
                }
                // Unreachable after validate(); report rather than loop.
                None => {
                    return Err(DivisionError::CyclicDependency {
                        cycle: self.find_cycle().unwrap_or_default(),
                    })
                }
            }
        }
        Ok(order)
    }

    /// Appends inferred edges to the registry's dependency sets.
    pub fn apply_to(&self, registry: &mut RepositoryRegistry) -> usize {
        self.dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Inferred)
            .filter(|d| registry.add_dependency(&d.source, &d.target))
            .count()
    }
}

/// A regex matching any spelling as a whole token.
fn reference_matcher(names: &BTreeSet<String>) -> Option<(Regex, BTreeSet<String>)> {
    if names.is_empty() {
        return None;
    }
    // Longest first so `core-lib-extra` is not reported as `core-lib`.
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort_by_key(|n| std::cmp::Reverse(n.len()));
    let alternatives: Vec<String> = sorted.iter().map(|n| regex::escape(n)).collect();
    let pattern = format!(
        r"(?:^|[^A-Za-z0-9_\-])({})(?:$|[^A-Za-z0-9_\-])",
        alternatives.join("|")
    );
    Regex::new(&pattern).ok().map(|r| (r, names.clone()))
}

/// First reference to another repository: dependency evidence from import
/// and manifest lines wins over a plain text match.
fn find_reference(files: &[ParsedFileDiff], regex: &Regex, names: &BTreeSet<String>) -> Option<String> {
    for file in files {
        for (name, evidence) in extract_dependencies(file) {
            let last = name.rsplit('/').next().unwrap_or(&name);
            if names.contains(&name) || names.contains(last) {
                return Some(evidence);
            }
        }
    }

    for file in files {
        for hunk in &file.hunks {
            for line in hunk.lines.iter().filter(|l| l.kind != DiffLineKind::Delete) {
                if let Some(caps) = regex.captures(&line.content) {
                    let location = line
                        .new_line
                        .map_or_else(|| file.path.clone(), |n| format!("{}:{n}", file.path));
                    return Some(format!("reference to '{}' in {location}", &caps[1]));
                }
            }
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::diff::FileChangeKind;
    use crate::multi_repo::registry::Repository;
    use std::path::PathBuf;

    fn repo(name: &str, deps: &[&str]) -> Repository {
        Repository {
            name: name.to_string(),
            path: PathBuf::from(name),
            package: None,
            dependencies: deps.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    fn change(path: &str, added: &str) -> FileDiff {
        FileDiff {
            path: path.to_string(),
            change_type: FileChangeKind::Modify,
            diff: format!(
                "diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1 +1,2 @@\n x\n+{added}\n"
            ),
        }
    }

    fn cross(entries: &[(&str, Vec<FileDiff>)]) -> CrossRepoDiff {
        CrossRepoDiff {
            repositories: entries.iter().map(|(n, _)| (*n).to_string()).collect(),
            changes: entries
                .iter()
                .map(|(n, f)| ((*n).to_string(), f.clone()))
                .collect(),
        }
    }

    fn chain_registry() -> RepositoryRegistry {
        RepositoryRegistry::from_repositories(vec![
            repo("core-lib", &[]),
            repo("api-service", &["core-lib"]),
            repo("frontend-app", &["api-service"]),
        ])
        .unwrap()
    }

    #[test]
    fn declared_chain_orders_dependencies_first() {
        let diff = cross(&[
            ("frontend-app", vec![change("src/app.ts", "render()")]),
            ("api-service", vec![change("src/api.rs", "serve()")]),
            ("core-lib", vec![change("src/lib.rs", "compute()")]),
        ]);
        let graph = DependencyGraph::build(&diff, &chain_registry());
        assert_eq!(graph.dependencies().len(), 2);
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["core-lib", "api-service", "frontend-app"]
        );
    }

    #[test]
    fn references_in_content_infer_edges() {
        let registry = RepositoryRegistry::from_repositories(vec![
            repo("core-lib", &[]),
            repo("api-service", &[]),
        ])
        .unwrap();
        let diff = cross(&[
            ("api-service", vec![change("src/api.rs", "use core_lib::Engine;")]),
            ("core-lib", vec![change("src/lib.rs", "pub struct Engine;")]),
        ]);
        let graph = DependencyGraph::build(&diff, &registry);
        let deps = graph.dependencies();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].source, "api-service");
        assert_eq!(deps[0].target, "core-lib");
        assert_eq!(deps[0].kind, DependencyKind::Inferred);
        assert_eq!(deps[0].evidence, "import in src/api.rs:2");
    }

    #[test]
    fn plain_text_mentions_are_inferred_too() {
        let registry = RepositoryRegistry::from_repositories(vec![
            repo("core-lib", &[]),
            repo("docs-site", &[]),
        ])
        .unwrap();
        let diff = cross(&[
            ("docs-site", vec![change("guide.md", "See the core-lib crate.")]),
            ("core-lib", vec![change("src/lib.rs", "x")]),
        ]);
        let graph = DependencyGraph::build(&diff, &registry);
        assert_eq!(
            graph.dependencies()[0].evidence,
            "reference to 'core-lib' in guide.md:2"
        );
        assert!(graph.dependencies_of("core-lib").is_empty());
    }

    #[test]
    fn token_boundaries_are_respected() {
        let registry = RepositoryRegistry::from_repositories(vec![
            repo("core-lib", &[]),
            repo("app", &[]),
        ])
        .unwrap();
        let diff = cross(&[
            ("app", vec![change("a.txt", "mycore-libextra")]),
            ("core-lib", vec![change("b.txt", "x")]),
        ]);
        assert!(DependencyGraph::build(&diff, &registry).dependencies().is_empty());
    }

    #[test]
    fn cycles_are_hard_errors() {
        let registry = RepositoryRegistry::from_repositories(vec![
            repo("alpha", &["beta"]),
            repo("beta", &["gamma"]),
            repo("gamma", &["alpha"]),
        ])
        .unwrap();
        let diff = cross(&[
            ("alpha", vec![change("a", "x")]),
            ("beta", vec![change("b", "x")]),
            ("gamma", vec![change("c", "x")]),
        ]);
        let graph = DependencyGraph::build(&diff, &registry);
        assert_eq!(
            graph.find_cycle().unwrap(),
            vec!["alpha", "beta", "gamma", "alpha"]
        );
        let err = graph.topological_order().unwrap_err();
        assert!(matches!(err, DivisionError::CyclicDependency { .. }));
    }

    #[test]
    fn unrelated_repositories_keep_input_order() {
        let registry = RepositoryRegistry::from_repositories(vec![
            repo("zeta", &[]),
            repo("alpha", &[]),
        ])
        .unwrap();
        let diff = cross(&[("zeta", vec![]), ("alpha", vec![])]);
        let graph = DependencyGraph::build(&diff, &registry);
        assert_eq!(graph.topological_order().unwrap(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn inferred_edges_are_appended_to_registry() {
        let mut registry = RepositoryRegistry::from_repositories(vec![
            repo("core-lib", &[]),
            repo("api-service", &[]),
        ])
        .unwrap();
        let diff = cross(&[
            ("api-service", vec![change("Cargo.toml", "core-lib = \"1\"")]),
            ("core-lib", vec![]),
        ]);
        let graph = DependencyGraph::build(&diff, &registry);
        assert_eq!(graph.apply_to(&mut registry), 1);
        assert!(registry
            .get("api-service")
            .unwrap()
            .dependencies
            .contains("core-lib"));
    }
}
