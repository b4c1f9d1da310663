//! Assembles semantic patterns into an ordered division proposal.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::message::message_for_pattern;
use crate::analysis::{AnalysisResult, ChangeType, DiffAnalyzer, SemanticPattern};
use crate::config::{EngineConfig, ProposalDefaults};
use crate::diff::{FileChangeKind, FileDiff};

/// How files are grouped into proposed commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivisionStrategy {
    /// Cluster by tag and keyword overlap.
    #[default]
    Semantic,
    /// One commit per change type.
    ByType,
    /// One commit per file.
    ByFile,
}

impl fmt::Display for DivisionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Semantic => "semantic",
            Self::ByType => "by-type",
            Self::ByFile => "by-file",
        })
    }
}

impl FromStr for DivisionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "semantic" => Ok(Self::Semantic),
            "by-type" | "type" => Ok(Self::ByType),
            "by-file" | "file" => Ok(Self::ByFile),
            other => Err(format!(
                "Unknown strategy '{other}' (expected semantic, by-type or by-file)"
            )),
        }
    }
}

/// Knobs for one proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalOptions {
    /// Grouping strategy.
    pub strategy: DivisionStrategy,
    /// Patterns below this confidence are merged together.
    pub min_confidence: f64,
    /// Upper bound on the number of commits.
    pub max_commits: Option<usize>,
}

impl Default for ProposalOptions {
    fn default() -> Self {
        Self::from(&ProposalDefaults::default())
    }
}

impl From<&ProposalDefaults> for ProposalOptions {
    fn from(defaults: &ProposalDefaults) -> Self {
        Self {
            strategy: defaults.strategy,
            min_confidence: defaults.min_confidence,
            max_commits: defaults.max_commits,
        }
    }
}

/// One commit of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedCommit {
    /// Conventional-commit message.
    pub message: String,
    /// File changes in this commit, in diff order.
    pub changes: Vec<FileDiff>,
    /// Dominant change type.
    pub change_type: ChangeType,
    /// Keywords of the pattern behind this commit.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Confidence of the pattern behind this commit.
    #[serde(default)]
    pub confidence: f64,
    /// Name of the pattern behind this commit.
    #[serde(default)]
    pub pattern: String,
}

/// Ordered plan for splitting one commit range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitDivisionProposal {
    /// Start of the range (the commit the new commits are built on).
    pub original_commit_id: String,
    /// End of the range (the state the new commits reproduce).
    pub target_commit_id: String,
    /// Commits in the order they should be created.
    pub proposed_commits: Vec<ProposedCommit>,
    /// Number of distinct files across all commits.
    pub total_changes: usize,
    /// Mean confidence of the commits.
    pub confidence_score: f64,
    /// Why the analysis behind the proposal degraded, if it did.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl CommitDivisionProposal {
    /// Every path referenced by the proposal.
    pub fn paths(&self) -> BTreeSet<&str> {
        self.proposed_commits
            .iter()
            .flat_map(|c| c.changes.iter().map(|f| f.path.as_str()))
            .collect()
    }
}

/// Builds [`CommitDivisionProposal`]s from analysis results.
#[derive(Debug, Clone)]
pub struct DivisionProposalBuilder {
    analyzer: DiffAnalyzer,
}

impl DivisionProposalBuilder {
    /// Creates a builder from engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            analyzer: DiffAnalyzer::new(config),
        }
    }

    /// The analyzer this builder groups with.
    pub fn analyzer(&self) -> &DiffAnalyzer {
        &self.analyzer
    }

    /// Analyzes raw diff text and builds a proposal from it.
    pub fn build_from_diff(
        &self,
        diff: &str,
        original_commit_id: &str,
        target_commit_id: &str,
        options: &ProposalOptions,
        description: Option<&str>,
    ) -> CommitDivisionProposal {
        let analysis = self.analyzer.analyze_diff(diff, description);
        self.build(&analysis, original_commit_id, target_commit_id, options, description)
    }

    /// Builds a proposal from an existing analysis.
    pub fn build(
        &self,
        analysis: &AnalysisResult,
        original_commit_id: &str,
        target_commit_id: &str,
        options: &ProposalOptions,
        description: Option<&str>,
    ) -> CommitDivisionProposal {
        let patterns = if analysis.is_degraded() || analysis.parsed_files.is_empty() {
            analysis.semantic_groups.clone()
        } else {
            let grouped = self.group(analysis, options.strategy, description);
            let merged = self.merge_low_confidence(grouped, options.min_confidence);
            let mut limited = match options.max_commits {
                Some(limit) => self.limit(merged, limit.max(1)),
                None => merged,
            };
            limited.sort_by_key(|p| p.change_type.commit_order());
            limited
        };

        let proposed_commits: Vec<ProposedCommit> = patterns
            .iter()
            .map(|p| commit_for_pattern(p, analysis))
            .collect();

        let total_changes = proposed_commits
            .iter()
            .flat_map(|c| c.changes.iter().map(|f| f.path.as_str()))
            .collect::<BTreeSet<_>>()
            .len();

        let confidence_score = if proposed_commits.is_empty() {
            0.0
        } else {
            let sum: f64 = proposed_commits.iter().map(|c| c.confidence).sum();
            round3(sum / proposed_commits.len() as f64)
        };

        debug!(
            commits = proposed_commits.len(),
            total_changes,
            confidence_score,
            strategy = %options.strategy,
            "Built division proposal"
        );

        let diagnostics = analysis
            .code_patterns
            .iter()
            .filter(|p| p.starts_with("error: ") || p.starts_with("malformed: "))
            .cloned()
            .collect();

        CommitDivisionProposal {
            original_commit_id: original_commit_id.to_string(),
            target_commit_id: target_commit_id.to_string(),
            proposed_commits,
            total_changes,
            confidence_score,
            diagnostics,
        }
    }

    fn group(
        &self,
        analysis: &AnalysisResult,
        strategy: DivisionStrategy,
        description: Option<&str>,
    ) -> Vec<SemanticPattern> {
        let identifier = self.analyzer.identifier();
        match strategy {
            DivisionStrategy::Semantic => analysis.semantic_groups.clone(),
            DivisionStrategy::ByType => {
                identifier.group_by_type(&analysis.parsed_files, description)
            }
            DivisionStrategy::ByFile => {
                identifier.group_by_file(&analysis.parsed_files, description)
            }
        }
    }

    fn merge_low_confidence(
        &self,
        patterns: Vec<SemanticPattern>,
        min_confidence: f64,
    ) -> Vec<SemanticPattern> {
        let weak = patterns
            .iter()
            .filter(|p| p.confidence < min_confidence)
            .count();
        if weak < 2 {
            return patterns;
        }

        let mut out: Vec<SemanticPattern> = Vec::with_capacity(patterns.len() - weak + 1);
        let mut merged_at: Option<usize> = None;
        for pattern in patterns {
            if pattern.confidence >= min_confidence {
                out.push(pattern);
                continue;
            }
            match merged_at {
                Some(i) => out[i] = self.merge(&out[i], &pattern),
                None => {
                    merged_at = Some(out.len());
                    out.push(pattern);
                }
            }
        }
        debug!(merged = weak, min_confidence, "Merged low-confidence patterns");
        out
    }

    /// Merges patterns until at most `limit` remain: the smallest same-type
    /// pair first, then the smallest pattern into its smaller neighbour.
    fn limit(&self, mut patterns: Vec<SemanticPattern>, limit: usize) -> Vec<SemanticPattern> {
        while patterns.len() > limit {
            let same_type = (0..patterns.len())
                .flat_map(|a| ((a + 1)..patterns.len()).map(move |b| (a, b)))
                .filter(|&(a, b)| patterns[a].change_type == patterns[b].change_type)
                .min_by_key(|&(a, b)| (patterns[a].files.len() + patterns[b].files.len(), a, b));

            let (keep, absorb) = match same_type {
                Some(pair) => pair,
                None => {
                    let smallest = (0..patterns.len())
                        .min_by_key(|&i| (patterns[i].files.len(), i))
                        .unwrap_or(0);
                    let neighbour = match (smallest.checked_sub(1), smallest + 1) {
                        (Some(prev), next) if next < patterns.len() => {
                            if patterns[next].files.len() < patterns[prev].files.len() {
                                next
                            } else {
                                prev
                            }
                        }
                        (Some(prev), _) => prev,
                        (None, next) => next,
                    };
                    (smallest.min(neighbour), smallest.max(neighbour))
                }
            };

            let removed = patterns.remove(absorb);
            patterns[keep] = self.merge(&patterns[keep], &removed);
        }
        patterns
    }

    fn merge(&self, a: &SemanticPattern, b: &SemanticPattern) -> SemanticPattern {
        let mut tags = vec![a.change_type; a.files.len().max(1)];
        tags.extend(std::iter::repeat(b.change_type).take(b.files.len().max(1)));
        let dominant = self
            .analyzer
            .identifier()
            .classifier()
            .dominant(&tags);

        let (na, nb) = (a.files.len().max(1) as f64, b.files.len().max(1) as f64);
        let agreement = tags.iter().filter(|t| **t == dominant).count() as f64 / tags.len() as f64;
        let mean = (a.confidence * na + b.confidence * nb) / (na + nb);

        let pattern = if a.change_type == dominant {
            a.pattern.clone()
        } else if b.change_type == dominant {
            b.pattern.clone()
        } else {
            format!("{}_changes", dominant.as_str())
        };

        SemanticPattern {
            pattern,
            change_type: dominant,
            confidence: round3((mean * agreement).clamp(0.0, 1.0)),
            files: a.files.union(&b.files).cloned().collect(),
            keywords: a.keywords.union(&b.keywords).cloned().collect(),
        }
    }
}

fn commit_for_pattern(pattern: &SemanticPattern, analysis: &AnalysisResult) -> ProposedCommit {
    let mut seen = BTreeSet::new();
    let mut changes: Vec<FileDiff> = analysis
        .parsed_files
        .iter()
        .filter(|f| pattern.files.contains(&f.path) && seen.insert(f.path.clone()))
        .map(FileDiff::from)
        .collect();

    // Paths known only by name (e.g. a degraded analysis) still count.
    for path in &pattern.files {
        if seen.insert(path.clone()) {
            changes.push(FileDiff {
                path: path.clone(),
                change_type: FileChangeKind::Modify,
                diff: String::new(),
            });
        }
    }

    ProposedCommit {
        message: message_for_pattern(pattern),
        changes,
        change_type: pattern.change_type,
        keywords: pattern.keywords.clone(),
        confidence: pattern.confidence,
        pattern: pattern.pattern.clone(),
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
