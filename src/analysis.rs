//! Diff analysis: classification, grouping and aggregate statistics.

pub mod boundary;
pub mod classifier;
pub mod dependencies;
pub mod keywords;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use boundary::{
    SemanticBoundaryIdentifier, SemanticPattern, ERROR_PATTERN, SENTINEL_CONFIDENCE,
    WORKSPACE_ERROR_PATTERN,
};
pub use classifier::{ChangeClassifier, ChangeType, Classification, SignalStrength};

use crate::config::EngineConfig;
use crate::diff::{parse_unified_diff, FileChangeKind, FileDiff, ParsedFileDiff};

/// Markers worth surfacing when they appear on added lines.
const ATTENTION_MARKERS: &[&str] = &["TODO", "FIXME", "XXX", "HACK"];

/// Aggregate view of one diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Paths of every changed file.
    pub files: BTreeSet<String>,
    /// Added lines across all files.
    pub additions: usize,
    /// Removed lines across all files.
    pub deletions: usize,
    /// Extension (lowercased, without dot) to file count.
    pub file_extensions: BTreeMap<String, usize>,
    /// File change kind to file count.
    pub change_types: BTreeMap<FileChangeKind, usize>,
    /// Diagnostic signals such as `binary: path` or `error: reason`.
    pub code_patterns: BTreeSet<String>,
    /// Dependency name to the first evidence found for it.
    pub dependencies: BTreeMap<String, String>,
    /// Semantic groups of the changed files.
    pub semantic_groups: Vec<SemanticPattern>,
    /// Parsed files the result was built from, in diff order.
    #[serde(skip)]
    pub parsed_files: Vec<ParsedFileDiff>,
}

impl AnalysisResult {
    /// True when analysis could not look at the changes.
    pub fn is_degraded(&self) -> bool {
        self.semantic_groups.len() == 1 && self.semantic_groups[0].is_sentinel()
    }
}

/// Runs parsing, classification and grouping over a diff.
#[derive(Debug, Clone)]
pub struct DiffAnalyzer {
    identifier: SemanticBoundaryIdentifier,
}

impl DiffAnalyzer {
    /// Creates an analyzer from engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            identifier: SemanticBoundaryIdentifier::new(config),
        }
    }

    /// The boundary identifier used for grouping.
    pub fn identifier(&self) -> &SemanticBoundaryIdentifier {
        &self.identifier
    }

    /// Analyzes raw unified diff text.
    pub fn analyze_diff(&self, diff: &str, description: Option<&str>) -> AnalysisResult {
        self.analyze_parsed(parse_unified_diff(diff), description)
    }

    /// Analyzes per-file slices, e.g. as returned by a backend.
    pub fn analyze_files(&self, files: &[FileDiff], description: Option<&str>) -> AnalysisResult {
        self.analyze_parsed(files.iter().map(FileDiff::parse).collect(), description)
    }

    /// Analyzes already-parsed files.
    pub fn analyze_parsed(
        &self,
        parsed: Vec<ParsedFileDiff>,
        description: Option<&str>,
    ) -> AnalysisResult {
        let parsed = merge_repeated_paths(parsed);
        let mut result = AnalysisResult::default();

        for file in &parsed {
            result.files.insert(file.path.clone());
            result.additions += file.additions;
            result.deletions += file.deletions;
            if let Some(ext) = file.extension() {
                *result.file_extensions.entry(ext).or_insert(0) += 1;
            }
            *result.change_types.entry(file.change_type).or_insert(0) += 1;

            collect_diagnostics(file, &mut result.code_patterns);
            for (name, evidence) in dependencies::extract_dependencies(file) {
                result.dependencies.entry(name).or_insert(evidence);
            }
        }

        if parsed.is_empty() {
            result
                .code_patterns
                .insert("error: no changes to analyze".to_string());
        }

        result.semantic_groups = self.identifier.identify(&parsed, description);
        result.parsed_files = parsed;

        debug!(
            files = result.files.len(),
            additions = result.additions,
            deletions = result.deletions,
            groups = result.semantic_groups.len(),
            "Analyzed diff"
        );
        result
    }

    /// The degraded result used when the repository could not be read.
    ///
    /// `files` may carry whatever paths are known; they are attached to the
    /// `workspace_error` sentinel so nothing silently disappears.
    pub fn failed(&self, reason: &str, files: BTreeSet<String>) -> AnalysisResult {
        warn!(reason, "Analysis degraded to sentinel pattern");
        AnalysisResult {
            files: files.clone(),
            code_patterns: BTreeSet::from([format!("error: {reason}")]),
            semantic_groups: vec![SemanticPattern::error_sentinel(
                WORKSPACE_ERROR_PATTERN,
                files,
            )],
            ..AnalysisResult::default()
        }
    }
}

/// One record per path, in first-appearance order. A path split over
/// several sections must still land in exactly one group.
fn merge_repeated_paths(parsed: Vec<ParsedFileDiff>) -> Vec<ParsedFileDiff> {
    let mut merged: Vec<ParsedFileDiff> = Vec::with_capacity(parsed.len());
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();
    for file in parsed {
        match positions.get(&file.path) {
            Some(&i) => merged[i].absorb(file),
            None => {
                positions.insert(file.path.clone(), merged.len());
                merged.push(file);
            }
        }
    }
    merged
}

fn collect_diagnostics(file: &ParsedFileDiff, patterns: &mut BTreeSet<String>) {
    if file.is_binary {
        patterns.insert(format!("binary: {}", file.path));
    }
    if file.malformed {
        patterns.insert(format!("malformed: {}", file.path));
    }
    if file.is_rename() {
        if let Some(old) = &file.old_path {
            patterns.insert(format!("rename: {old} -> {}", file.path));
        }
    }
    for hunk in &file.hunks {
        for line in hunk.lines.iter().filter(|l| l.kind == crate::diff::DiffLineKind::Add) {
            if let Some(marker) = ATTENTION_MARKERS.iter().find(|m| line.content.contains(**m)) {
                let location = line
                    .new_line
                    .map_or_else(|| file.path.clone(), |n| format!("{}:{n}", file.path));
                patterns.insert(format!("{}: {location}", marker.to_lowercase()));
            }
        }
    }
}
