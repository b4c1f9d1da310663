//! Clusters changed files into semantic patterns.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::{ChangeClassifier, ChangeType, Classification};
use super::keywords::{file_keywords, overlap, path_keywords};
use crate::config::{EngineConfig, GroupingConfig};
use crate::diff::ParsedFileDiff;

/// Pattern name used when a diff has nothing to analyze.
pub const ERROR_PATTERN: &str = "error";

/// Pattern name used when the repository itself could not be read.
pub const WORKSPACE_ERROR_PATTERN: &str = "workspace_error";

/// Confidence carried by the sentinel patterns.
pub const SENTINEL_CONFIDENCE: f64 = 0.1;

/// Words that describe what kind of file something is rather than what it is
/// about; ignored when matching tests and docs to the code they accompany.
const KIND_WORDS: &[&str] = &[
    "test", "tests", "testing", "spec", "specs", "docs", "doc", "documentation", "readme",
];

/// A cluster of changed files judged to share one purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticPattern {
    /// Identifier such as `bugfix_parser`.
    pub pattern: String,
    /// Dominant tag of the member files.
    pub change_type: ChangeType,
    /// Agreement strength among the members, in `[0, 1]`.
    pub confidence: f64,
    /// Member file paths.
    pub files: BTreeSet<String>,
    /// Trigger words and path keywords found across the members.
    pub keywords: BTreeSet<String>,
}

impl SemanticPattern {
    /// The low-confidence placeholder emitted instead of failing.
    pub fn error_sentinel(name: &str, files: BTreeSet<String>) -> Self {
        Self {
            pattern: name.to_string(),
            change_type: ChangeType::Chore,
            confidence: SENTINEL_CONFIDENCE,
            files,
            keywords: BTreeSet::from(["error".to_string()]),
        }
    }

    /// True for the `error` and `workspace_error` placeholders.
    pub fn is_sentinel(&self) -> bool {
        (self.pattern == ERROR_PATTERN || self.pattern == WORKSPACE_ERROR_PATTERN)
            && self.change_type == ChangeType::Chore
            && self.keywords.contains("error")
    }
}

/// Per-file facts gathered before clustering.
struct FileFacts<'a> {
    path: &'a str,
    classification: Classification,
    keywords: BTreeSet<String>,
}

impl FileFacts<'_> {
    fn subject_keywords(&self) -> BTreeSet<String> {
        self.keywords
            .iter()
            .filter(|k| !KIND_WORDS.contains(&k.as_str()))
            .filter(|k| !self.classification.triggers.contains(*k))
            .cloned()
            .collect()
    }
}

/// Groups parsed file diffs into [`SemanticPattern`]s.
#[derive(Debug, Clone)]
pub struct SemanticBoundaryIdentifier {
    classifier: ChangeClassifier,
    grouping: GroupingConfig,
}

impl SemanticBoundaryIdentifier {
    /// Creates an identifier from engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            classifier: ChangeClassifier::new(&config.classifier),
            grouping: config.grouping.clone(),
        }
    }

    /// The classifier used for per-file tags.
    pub fn classifier(&self) -> &ChangeClassifier {
        &self.classifier
    }

    /// Clusters files by tag and keyword overlap.
    ///
    /// Files with the same tag join when their keyword sets overlap by at
    /// least `min_keyword_overlap`. A lone test or docs file then joins the
    /// code cluster whose subject keywords overlap its own by at least
    /// `strong_keyword_overlap`. An empty input yields the `error` sentinel.
    pub fn identify(
        &self,
        files: &[ParsedFileDiff],
        description: Option<&str>,
    ) -> Vec<SemanticPattern> {
        if files.is_empty() {
            return vec![SemanticPattern::error_sentinel(ERROR_PATTERN, BTreeSet::new())];
        }
        let facts = self.gather(files, description);

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for (_, members) in bucket_by_tag(&facts) {
            clusters.extend(self.cluster_bucket(&facts, &members));
        }
        self.absorb_companions(&facts, &mut clusters);
        clusters.sort_by_key(|c| c.first().copied().unwrap_or(usize::MAX));

        let patterns = self.finish(&facts, clusters);
        debug!(
            files = files.len(),
            patterns = patterns.len(),
            "Identified semantic boundaries"
        );
        patterns
    }

    /// One pattern per change type, in order of first appearance.
    pub fn group_by_type(
        &self,
        files: &[ParsedFileDiff],
        description: Option<&str>,
    ) -> Vec<SemanticPattern> {
        if files.is_empty() {
            return vec![SemanticPattern::error_sentinel(ERROR_PATTERN, BTreeSet::new())];
        }
        let facts = self.gather(files, description);
        let clusters = bucket_by_tag(&facts).into_iter().map(|(_, m)| m).collect();
        self.finish(&facts, clusters)
    }

    /// One pattern per file, in diff order.
    pub fn group_by_file(
        &self,
        files: &[ParsedFileDiff],
        description: Option<&str>,
    ) -> Vec<SemanticPattern> {
        if files.is_empty() {
            return vec![SemanticPattern::error_sentinel(ERROR_PATTERN, BTreeSet::new())];
        }
        let facts = self.gather(files, description);
        let clusters = (0..facts.len()).map(|i| vec![i]).collect();
        self.finish(&facts, clusters)
    }

    fn gather<'a>(
        &self,
        files: &'a [ParsedFileDiff],
        description: Option<&str>,
    ) -> Vec<FileFacts<'a>> {
        files
            .iter()
            .map(|file| {
                let classification = self.classifier.classify_file(file, description);
                let keywords = file_keywords(file, &classification.triggers);
                FileFacts {
                    path: &file.path,
                    classification,
                    keywords,
                }
            })
            .collect()
    }

    fn cluster_bucket(&self, facts: &[FileFacts<'_>], members: &[usize]) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..members.len()).collect();

        for a in 0..members.len() {
            for b in (a + 1)..members.len() {
                let ka = &facts[members[a]].keywords;
                let kb = &facts[members[b]].keywords;
                let shares = ka.intersection(kb).next().is_some();
                if shares && overlap(ka, kb) >= self.grouping.min_keyword_overlap {
                    let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                    if ra != rb {
                        parent[ra.max(rb)] = ra.min(rb);
                    }
                }
            }
        }

        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for local in 0..members.len() {
            let root = find(&mut parent, local);
            by_root.entry(root).or_default().push(members[local]);
        }
        by_root.into_values().collect()
    }

    fn absorb_companions(&self, facts: &[FileFacts<'_>], clusters: &mut Vec<Vec<usize>>) {
        let is_companion = |cluster: &[usize]| {
            cluster.len() == 1
                && matches!(
                    facts[cluster[0]].classification.change_type,
                    ChangeType::Test | ChangeType::Docs
                )
        };

        let mut absorbed = vec![false; clusters.len()];
        for companion in 0..clusters.len() {
            if !is_companion(&clusters[companion]) {
                continue;
            }
            let subject = facts[clusters[companion][0]].subject_keywords();
            if subject.is_empty() {
                continue;
            }

            let mut best: Option<(usize, f64)> = None;
            for (target, cluster) in clusters.iter().enumerate() {
                if target == companion || absorbed[target] || is_companion(cluster) {
                    continue;
                }
                let tag = facts[cluster[0]].classification.change_type;
                if matches!(tag, ChangeType::Test | ChangeType::Docs) {
                    continue;
                }
                let target_subject: BTreeSet<String> = cluster
                    .iter()
                    .flat_map(|&i| facts[i].subject_keywords())
                    .collect();
                let score = overlap(&subject, &target_subject);
                if score >= self.grouping.strong_keyword_overlap
                    && best.map_or(true, |(_, s)| score > s)
                {
                    best = Some((target, score));
                }
            }

            if let Some((target, _)) = best {
                let member = clusters[companion][0];
                debug!(file = facts[member].path, "Absorbing companion file into code group");
                clusters[target].push(member);
                clusters[target].sort_unstable();
                absorbed[companion] = true;
            }
        }

        let mut index = 0;
        clusters.retain(|_| {
            let keep = !absorbed[index];
            index += 1;
            keep
        });
    }

    fn finish(&self, facts: &[FileFacts<'_>], clusters: Vec<Vec<usize>>) -> Vec<SemanticPattern> {
        let mut used_names: BTreeMap<String, usize> = BTreeMap::new();
        clusters
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|members| {
                let mut pattern = self.score(facts, &members);
                let count = used_names.entry(pattern.pattern.clone()).or_insert(0);
                *count += 1;
                if *count > 1 {
                    pattern.pattern = format!("{}_{count}", pattern.pattern);
                }
                pattern
            })
            .collect()
    }

    fn score(&self, facts: &[FileFacts<'_>], members: &[usize]) -> SemanticPattern {
        let tags: Vec<ChangeType> = members
            .iter()
            .map(|&i| facts[i].classification.change_type)
            .collect();
        let dominant = self.classifier.dominant(&tags);
        let n = members.len() as f64;

        let agreement = tags.iter().filter(|t| **t == dominant).count() as f64 / n;
        let mean_weight = members
            .iter()
            .map(|&i| facts[i].classification.signal.weight())
            .sum::<f64>()
            / n;

        let bonus = if members.len() > 1
            && mean_pairwise_overlap(facts, members) >= self.grouping.strong_keyword_overlap
        {
            self.grouping.cohesion_bonus
        } else {
            1.0
        };
        let confidence = round3((agreement * mean_weight * bonus).clamp(0.0, 1.0));

        let files = members.iter().map(|&i| facts[i].path.to_string()).collect();
        let keywords = members
            .iter()
            .flat_map(|&i| facts[i].keywords.iter().cloned())
            .collect();

        SemanticPattern {
            pattern: pattern_name(facts, members, dominant),
            change_type: dominant,
            confidence,
            files,
            keywords,
        }
    }
}

/// Members of each tag, tags in order of first appearance.
fn bucket_by_tag(facts: &[FileFacts<'_>]) -> Vec<(ChangeType, Vec<usize>)> {
    let mut buckets: Vec<(ChangeType, Vec<usize>)> = Vec::new();
    for (i, fact) in facts.iter().enumerate() {
        let tag = fact.classification.change_type;
        match buckets.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, members)) => members.push(i),
            None => buckets.push((tag, vec![i])),
        }
    }
    buckets
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

fn mean_pairwise_overlap(facts: &[FileFacts<'_>], members: &[usize]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (pos, &a) in members.iter().enumerate() {
        for &b in &members[pos + 1..] {
            total += overlap(&facts[a].keywords, &facts[b].keywords);
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

/// `{type}_{keyword}`, where the keyword is the path keyword shared by the
/// most members (alphabetical on ties).
fn pattern_name(facts: &[FileFacts<'_>], members: &[usize], tag: ChangeType) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for &i in members {
        for keyword in path_keywords(facts[i].path) {
            if !KIND_WORDS.contains(&keyword.as_str()) {
                *counts.entry(keyword).or_insert(0) += 1;
            }
        }
    }
    let top = counts
        .into_iter()
        .fold(None::<(String, usize)>, |best, (k, c)| match best {
            Some((_, bc)) if bc >= c => best,
            _ => Some((k, c)),
        })
        .map(|(k, _)| k);

    match top {
        Some(keyword) => format!("{}_{keyword}", tag.as_str()),
        None => format!("{}_changes", tag.as_str()),
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
