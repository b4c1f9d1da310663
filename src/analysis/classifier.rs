//! Change-type classification from paths, comments and descriptions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::diff::{FileChangeKind, ParsedFileDiff};

/// Semantic intent of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// New functionality.
    #[serde(alias = "feat")]
    Feature,
    /// A fix for incorrect behavior.
    #[serde(alias = "fix")]
    Bugfix,
    /// Documentation only.
    Docs,
    /// Code restructuring without behavior change.
    Refactor,
    /// Tests only.
    #[serde(alias = "tests")]
    Test,
    /// Maintenance and everything else.
    Chore,
    /// Formatting and lint-only changes.
    Style,
    /// Performance improvements.
    #[serde(alias = "perf")]
    Performance,
}

impl ChangeType {
    /// Every change type, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Feature,
        Self::Bugfix,
        Self::Docs,
        Self::Refactor,
        Self::Test,
        Self::Chore,
        Self::Style,
        Self::Performance,
    ];

    /// The conventional-commit type this change maps to.
    pub fn conventional_prefix(self) -> &'static str {
        match self {
            Self::Feature => "feat",
            Self::Bugfix => "fix",
            Self::Docs => "docs",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Chore => "chore",
            Self::Style => "style",
            Self::Performance => "perf",
        }
    }

    /// Inverse of [`ChangeType::conventional_prefix`].
    pub fn from_conventional_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.conventional_prefix() == prefix)
    }

    /// Lowercase name used in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bugfix => "bugfix",
            Self::Docs => "docs",
            Self::Refactor => "refactor",
            Self::Test => "test",
            Self::Chore => "chore",
            Self::Style => "style",
            Self::Performance => "performance",
        }
    }

    /// Position when ordering commits inside one repository: infrastructure
    /// first, behavior next, tests and docs last.
    pub fn commit_order(self) -> usize {
        match self {
            Self::Chore => 0,
            Self::Refactor => 1,
            Self::Style => 2,
            Self::Performance => 3,
            Self::Bugfix => 4,
            Self::Feature => 5,
            Self::Test => 6,
            Self::Docs => 7,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower || t.conventional_prefix() == lower)
            .or_else(|| (lower == "tests").then_some(Self::Test))
            .ok_or_else(|| format!("Unknown change type: {s}"))
    }
}

/// How strongly the evidence supports a file's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    /// Path layout (docs or tests directory, documentation extension).
    Path,
    /// A trigger keyword in a description or changed comment.
    Keyword,
    /// A newly added source file with no other signal.
    Structural,
    /// A trigger word in the path or in changed code rather than comments.
    Content,
    /// Nothing matched; defaulted to chore.
    Fallback,
}

impl SignalStrength {
    /// Weight used when scoring group confidence.
    pub fn weight(self) -> f64 {
        match self {
            Self::Path => 0.9,
            Self::Keyword => 0.8,
            Self::Content => 0.7,
            Self::Structural => 0.6,
            Self::Fallback => 0.5,
        }
    }
}

/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The winning tag.
    pub change_type: ChangeType,
    /// What kind of evidence produced the tag.
    pub signal: SignalStrength,
    /// Every trigger word found, across all rules.
    pub triggers: BTreeSet<String>,
}

const BUGFIX_WORDS: &[&str] = &[
    "fix", "fixes", "fixed", "fixing", "bug", "bugs", "bugfix", "hotfix", "issue", "issues",
    "error", "errors", "crash",
];
const FEATURE_WORDS: &[&str] = &[
    "feat", "feature", "features", "add", "adds", "added", "adding", "new", "implement",
    "implements", "implemented", "implementing", "introduce",
];
const DOCS_WORDS: &[&str] = &["doc", "docs", "documentation", "document", "readme"];
const TEST_WORDS: &[&str] = &["test", "tests", "testing", "spec", "specs"];
const REFACTOR_WORDS: &[&str] = &[
    "refactor", "refactored", "refactoring", "restructure", "reorganize", "reorganise",
    "cleanup", "simplify",
];
const STYLE_WORDS: &[&str] = &[
    "style", "format", "formatting", "formatted", "lint", "linting", "whitespace", "rustfmt",
    "prettier",
];
const PERFORMANCE_WORDS: &[&str] = &[
    "perf", "performance", "optimize", "optimise", "optimized", "optimization", "speed",
    "speedup", "faster",
];

static DOCS_PATHS: LazyLock<GlobSet> = LazyLock::new(|| {
    build_globset(
        &[
            "**/docs/**",
            "**/doc/**",
            "**/documentation/**",
            "**/*.md",
            "**/*.markdown",
            "**/*.rst",
            "**/*.adoc",
            "**/README*",
            "**/CHANGELOG*",
        ],
        true,
    )
});

static TEST_PATHS: LazyLock<GlobSet> = LazyLock::new(|| {
    build_globset(
        &[
            "**/tests/**",
            "**/test/**",
            "**/__tests__/**",
            "**/spec/**",
            "**/testdata/**",
            "**/*_test.*",
            "**/*_tests.*",
            "**/test_*",
            "**/*.test.*",
            "**/*.spec.*",
            "**/*_spec.*",
            "**/*-test.*",
            "**/*-spec.*",
            "**/*Test.*",
            "**/*Tests.*",
            "**/*Spec.*",
        ],
        false,
    )
});

/// Source-file extensions whose addition signals a new capability.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "go", "py", "js", "jsx", "ts", "tsx", "java", "kt", "c", "h", "cc", "cpp", "hpp", "cs",
    "rb", "php", "swift", "scala", "ex", "exs",
];

/// Comment leaders recognized at the start of a changed line.
const COMMENT_LEADERS: &[&str] = &["///", "//!", "//", "/*", "*", "#", "--", ";", "<!--", "\"\"\"", "'''"];

fn build_globset(patterns: &[&str], case_insensitive: bool) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => debug!("Ignoring invalid glob {pattern}: {e}"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Splits text into lowercase alphanumeric words.
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Returns the comment text of a source line, if it carries one.
pub(crate) fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for leader in COMMENT_LEADERS {
        if let Some(rest) = trimmed.strip_prefix(leader) {
            return Some(rest);
        }
    }
    // Trailing comments after code.
    if let Some(pos) = trimmed.find(" //") {
        return Some(&trimmed[pos + 3..]);
    }
    trimmed.find(" # ").map(|pos| &trimmed[pos + 2..])
}

/// Classifies files and free text into [`ChangeType`] tags.
///
/// Rules are tried in the configured precedence order and the first match
/// wins; chore is the fallback. Bugfix, feature, refactor, style and
/// performance rules read trigger words from the description and from
/// comments on changed lines. Docs and test rules read the path and the
/// description only, since prose and test code mention those words freely.
///
/// When nothing matches, a new source file is a feature. Otherwise the
/// keyword rules are tried again over the path segments and the changed
/// code lines, which name things less deliberately than comments do.
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    precedence: Vec<ChangeType>,
}

impl ChangeClassifier {
    /// Creates a classifier from configuration.
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            precedence: config.effective_precedence(),
        }
    }

    /// The effective rule order, chore excluded.
    pub fn precedence(&self) -> &[ChangeType] {
        &self.precedence
    }

    /// Rank of a type in the precedence order; chore ranks last.
    pub fn rank(&self, change_type: ChangeType) -> usize {
        self.precedence
            .iter()
            .position(|t| *t == change_type)
            .unwrap_or(self.precedence.len())
    }

    /// True when the path looks like documentation.
    pub fn is_docs_path(path: &str) -> bool {
        DOCS_PATHS.is_match(path)
    }

    /// True when the path looks like a test.
    pub fn is_test_path(path: &str) -> bool {
        TEST_PATHS.is_match(path)
    }

    /// Classifies one file, optionally guided by a description of the change.
    pub fn classify_file(&self, file: &ParsedFileDiff, description: Option<&str>) -> Classification {
        let description_words: BTreeSet<String> =
            description.map(|d| tokenize(d).collect()).unwrap_or_default();

        let is_docs = Self::is_docs_path(&file.path);
        let is_test = Self::is_test_path(&file.path);

        // Prose in documentation is not a statement of intent.
        let mut intent_words = description_words.clone();
        let mut content_words: BTreeSet<String> = tokenize(&file.path).collect();
        if !is_docs {
            for line in file.changed_lines() {
                match comment_text(&line.content) {
                    Some(comment) => intent_words.extend(tokenize(comment)),
                    None => content_words.extend(tokenize(&line.content)),
                }
            }
        }

        let mut triggers = BTreeSet::new();
        let mut winner: Option<(ChangeType, SignalStrength)> = None;

        for &rule in &self.precedence {
            let (hit, signal) = match rule {
                ChangeType::Docs => {
                    let words = matched_words(&description_words, DOCS_WORDS);
                    let hit = is_docs || !words.is_empty();
                    triggers.extend(words);
                    let signal = if is_docs {
                        SignalStrength::Path
                    } else {
                        SignalStrength::Keyword
                    };
                    (hit, signal)
                }
                ChangeType::Test => {
                    let words = matched_words(&description_words, TEST_WORDS);
                    let hit = is_test || !words.is_empty();
                    triggers.extend(words);
                    let signal = if is_test {
                        SignalStrength::Path
                    } else {
                        SignalStrength::Keyword
                    };
                    (hit, signal)
                }
                other => {
                    let words = matched_words(&intent_words, keyword_list(other));
                    let hit = !words.is_empty();
                    triggers.extend(words);
                    (hit, SignalStrength::Keyword)
                }
            };
            if hit && winner.is_none() {
                winner = Some((rule, signal));
            }
        }

        let (change_type, signal) = winner.unwrap_or_else(|| {
            let is_new_source = file.change_type == FileChangeKind::Add
                && !is_docs
                && !is_test
                && file
                    .extension()
                    .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()));
            if is_new_source && self.precedence.contains(&ChangeType::Feature) {
                return (ChangeType::Feature, SignalStrength::Structural);
            }
            match self.match_content(&content_words) {
                Some((rule, words)) => {
                    triggers.extend(words);
                    (rule, SignalStrength::Content)
                }
                None => (ChangeType::Chore, SignalStrength::Fallback),
            }
        });

        debug!(path = %file.path, %change_type, ?signal, "Classified file");

        Classification {
            change_type,
            signal,
            triggers,
        }
    }

    /// First keyword rule hit by path or code words, with the words it matched.
    fn match_content(&self, words: &BTreeSet<String>) -> Option<(ChangeType, Vec<String>)> {
        self.precedence
            .iter()
            .filter(|rule| !matches!(rule, ChangeType::Docs | ChangeType::Test))
            .find_map(|&rule| {
                let matched = matched_words(words, keyword_list(rule));
                (!matched.is_empty()).then_some((rule, matched))
            })
    }

    /// Classifies free text (e.g. a draft commit message) on its own.
    ///
    /// Returns `None` when no rule's trigger words appear.
    pub fn classify_text(&self, text: &str) -> Option<ChangeType> {
        let words: BTreeSet<String> = tokenize(text).collect();
        self.precedence
            .iter()
            .copied()
            .find(|rule| !matched_words(&words, keyword_list(*rule)).is_empty())
    }

    /// Majority vote over file tags; ties go to the earlier rule in the
    /// precedence order. An empty slice yields chore.
    pub fn dominant(&self, tags: &[ChangeType]) -> ChangeType {
        let mut best: Option<(ChangeType, usize)> = None;
        for candidate in ChangeType::ALL {
            let count = tags.iter().filter(|t| **t == candidate).count();
            if count == 0 {
                continue;
            }
            best = match best {
                None => Some((candidate, count)),
                Some((current, current_count)) => {
                    if count > current_count
                        || (count == current_count && self.rank(candidate) < self.rank(current))
                    {
                        Some((candidate, count))
                    } else {
                        Some((current, current_count))
                    }
                }
            };
        }
        best.map_or(ChangeType::Chore, |(t, _)| t)
    }
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

fn keyword_list(change_type: ChangeType) -> &'static [&'static str] {
    match change_type {
        ChangeType::Bugfix => BUGFIX_WORDS,
        ChangeType::Feature => FEATURE_WORDS,
        ChangeType::Docs => DOCS_WORDS,
        ChangeType::Test => TEST_WORDS,
        ChangeType::Refactor => REFACTOR_WORDS,
        ChangeType::Style => STYLE_WORDS,
        ChangeType::Performance => PERFORMANCE_WORDS,
        ChangeType::Chore => &[],
    }
}

fn matched_words(words: &BTreeSet<String>, list: &[&str]) -> Vec<String> {
    list.iter()
        .filter(|k| words.contains(**k))
        .map(|k| (*k).to_string())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::diff::parse_unified_diff;

    fn file(path: &str, kind: &str, body: &str) -> ParsedFileDiff {
        let mode = match kind {
            "add" => "new file mode 100644\n--- /dev/null\n".to_string(),
            _ => format!("--- a/{path}\n"),
        };
        let diff = format!("diff --git a/{path} b/{path}\n{mode}+++ b/{path}\n@@ -1 +1,2 @@\n{body}");
        parse_unified_diff(&diff).remove(0)
    }

    #[test]
    fn prefixes_round_trip() {
        for t in ChangeType::ALL {
            assert_eq!(ChangeType::from_conventional_prefix(t.conventional_prefix()), Some(t));
        }
    }

    #[test]
    fn parses_names_and_prefixes() {
        assert_eq!("feat".parse::<ChangeType>().unwrap(), ChangeType::Feature);
        assert_eq!("Bugfix".parse::<ChangeType>().unwrap(), ChangeType::Bugfix);
        assert_eq!("tests".parse::<ChangeType>().unwrap(), ChangeType::Test);
        assert!("nonsense".parse::<ChangeType>().is_err());
    }

    #[test]
    fn comment_with_fix_is_bugfix() {
        let classifier = ChangeClassifier::default();
        let f = file("src/file1.rs", "modify", " a\n+    // fix off-by-one error\n");
        let c = classifier.classify_file(&f, None);
        assert_eq!(c.change_type, ChangeType::Bugfix);
        assert_eq!(c.signal, SignalStrength::Keyword);
        assert!(c.triggers.contains("fix"));
        assert!(c.triggers.contains("error"));
    }

    #[test]
    fn comments_outrank_code_words() {
        let classifier = ChangeClassifier::default();
        let f = file(
            "src/file1.rs",
            "modify",
            " a\n+    // simplify lookup\n+    let e = Error::new(format!(\"x\"));\n",
        );
        let c = classifier.classify_file(&f, None);
        assert_eq!(c.change_type, ChangeType::Refactor);
        assert_eq!(c.signal, SignalStrength::Keyword);
        assert!(!c.triggers.contains("error"));
    }

    #[test]
    fn path_and_code_words_classify_uncommented_changes() {
        let classifier = ChangeClassifier::default();

        let f = file("src/fix_overflow.rs", "modify", " a\n+let total = a.saturating_add(b);\n");
        let c = classifier.classify_file(&f, None);
        assert_eq!(c.change_type, ChangeType::Bugfix);
        assert_eq!(c.signal, SignalStrength::Content);
        assert!(c.triggers.contains("fix"));

        let f = file("src/cache.rs", "modify", " a\n+fn refactor_entries() {}\n");
        let c = classifier.classify_file(&f, None);
        assert_eq!(c.change_type, ChangeType::Refactor);
        assert_eq!(c.signal, SignalStrength::Content);

        let f = file("src/lib.rs", "modify", " a\n+    let e = Error::new(kind);\n");
        assert_eq!(classifier.classify_file(&f, None).change_type, ChangeType::Bugfix);
    }

    #[test]
    fn plain_code_still_falls_back_to_chore() {
        let classifier = ChangeClassifier::default();
        let f = file("src/file1.rs", "modify", " a\n+let total = a + b;\n");
        let c = classifier.classify_file(&f, None);
        assert_eq!(c.change_type, ChangeType::Chore);
        assert_eq!(c.signal, SignalStrength::Fallback);
    }

    #[test]
    fn docs_path_ignores_prose_keywords() {
        let classifier = ChangeClassifier::default();
        let f = file("docs/readme.md", "modify", " intro\n+We added a new section to fix typos.\n");
        let c = classifier.classify_file(&f, None);
        assert_eq!(c.change_type, ChangeType::Docs);
        assert_eq!(c.signal, SignalStrength::Path);
    }

    #[test]
    fn test_file_with_fix_comment_surfaces_fix() {
        let classifier = ChangeClassifier::default();
        let f = file("tests/parser_test.rs", "modify", " a\n+// regression test for bug 12\n");
        assert_eq!(
            classifier.classify_file(&f, None).change_type,
            ChangeType::Bugfix
        );
    }

    #[test]
    fn plain_test_file_is_test() {
        let classifier = ChangeClassifier::default();
        let f = file("src/parser_test.go", "modify", " a\n+x := 1\n");
        assert_eq!(classifier.classify_file(&f, None).change_type, ChangeType::Test);
    }

    #[test]
    fn latest_is_not_a_test_file() {
        assert!(!ChangeClassifier::is_test_path("src/latest.rs"));
        assert!(ChangeClassifier::is_test_path("src/__tests__/app.js"));
        assert!(ChangeClassifier::is_test_path("pkg/FooTest.java"));
    }

    #[test]
    fn new_source_file_without_keywords_is_feature() {
        let classifier = ChangeClassifier::default();
        let f = file("src/file2.rs", "add", "+fn compute() {}\n+fn other() {}\n");
        let c = classifier.classify_file(&f, None);
        assert_eq!(c.change_type, ChangeType::Feature);
        assert_eq!(c.signal, SignalStrength::Structural);
    }

    #[test]
    fn description_guides_classification() {
        let classifier = ChangeClassifier::default();
        let f = file("src/lib.rs", "modify", " a\n+b\n");
        let c = classifier.classify_file(&f, Some("Refactor module layout"));
        assert_eq!(c.change_type, ChangeType::Refactor);
    }

    #[test]
    fn precedence_is_configurable() {
        let config = ClassifierConfig {
            precedence: vec![ChangeType::Feature, ChangeType::Bugfix],
        };
        let classifier = ChangeClassifier::new(&config);
        assert_eq!(
            classifier.classify_text("add a fix for the bug"),
            Some(ChangeType::Feature)
        );
        assert_eq!(
            ChangeClassifier::default().classify_text("add a fix for the bug"),
            Some(ChangeType::Bugfix)
        );
    }

    #[test]
    fn classify_text_covers_remaining_rules() {
        let classifier = ChangeClassifier::default();
        assert_eq!(classifier.classify_text("Optimize the hot loop"), Some(ChangeType::Performance));
        assert_eq!(classifier.classify_text("run rustfmt"), Some(ChangeType::Style));
        assert_eq!(classifier.classify_text("bump versions"), None);
    }

    #[test]
    fn dominant_breaks_ties_by_precedence() {
        let classifier = ChangeClassifier::default();
        let tags = [ChangeType::Docs, ChangeType::Bugfix];
        assert_eq!(classifier.dominant(&tags), ChangeType::Bugfix);

        let tags = [ChangeType::Docs, ChangeType::Docs, ChangeType::Bugfix];
        assert_eq!(classifier.dominant(&tags), ChangeType::Docs);

        assert_eq!(classifier.dominant(&[]), ChangeType::Chore);
    }

    #[test]
    fn comment_text_detects_leaders_and_trailing_comments() {
        assert_eq!(comment_text("  // hello"), Some(" hello"));
        assert_eq!(comment_text("# heading"), Some(" heading"));
        assert_eq!(comment_text("x = 1 # note"), Some(" note"));
        assert_eq!(comment_text("call(); // why"), Some(" why"));
        assert_eq!(comment_text("let x = 1;"), None);
    }
}
