//! Conventional-commit message synthesis.

use crate::analysis::{ChangeClassifier, ChangeType, SemanticPattern};

/// Longest message line we produce.
pub const MAX_MESSAGE_LEN: usize = 72;

/// Subject used for the sentinel pattern.
const SENTINEL_SUBJECT: &str = "review changes manually (analysis unavailable)";

/// Builds `<type>: <subject>` for a semantic pattern.
///
/// The subject names the file for single-file patterns and the pattern's
/// keyword otherwise.
pub fn message_for_pattern(pattern: &SemanticPattern) -> String {
    if pattern.is_sentinel() {
        return format_message(ChangeType::Chore, SENTINEL_SUBJECT);
    }
    let topic = if pattern.files.len() == 1 {
        pattern
            .files
            .iter()
            .next()
            .map(|p| file_name(p).to_string())
    } else {
        pattern_topic(&pattern.pattern, pattern.change_type)
    };
    let topic = topic.unwrap_or_else(|| "project files".to_string());
    format_message(pattern.change_type, &phrase(pattern.change_type, &topic))
}

/// Builds a message from a free-text description of the change.
///
/// The type comes from the classifier (chore when nothing matches); an
/// existing conventional prefix on the description is replaced.
pub fn message_for_description(
    classifier: &ChangeClassifier,
    description: &str,
    files: &[String],
) -> String {
    let first_line = description.lines().next().unwrap_or("").trim();
    let (declared, body) = match split_prefix(first_line) {
        Some((t, rest)) => (Some(t), rest.trim()),
        None => (None, first_line),
    };
    let change_type = declared
        .or_else(|| classifier.classify_text(body))
        .unwrap_or(ChangeType::Chore);

    let subject = body.trim_end_matches('.');
    if subject.is_empty() {
        let topic = match files {
            [only] => file_name(only).to_string(),
            _ => "project files".to_string(),
        };
        return format_message(change_type, &phrase(change_type, &topic));
    }
    format_message(change_type, &lowercase_first(subject))
}

/// Recovers the change type from a message's conventional prefix.
///
/// Accepts an optional scope and breaking-change marker, e.g. `feat(api)!:`.
pub fn parse_prefix(message: &str) -> Option<ChangeType> {
    split_prefix(message).map(|(t, _)| t)
}

fn split_prefix(message: &str) -> Option<(ChangeType, &str)> {
    let (head, rest) = message.split_once(':')?;
    let head = head.trim_end_matches('!');
    let head = match head.find('(') {
        Some(pos) if head.ends_with(')') => &head[..pos],
        _ => head,
    };
    ChangeType::from_conventional_prefix(head).map(|t| (t, rest))
}

fn phrase(change_type: ChangeType, topic: &str) -> String {
    match change_type {
        ChangeType::Feature => format!("add {topic}"),
        ChangeType::Bugfix => format!("resolve issue in {topic}"),
        ChangeType::Docs => format!("update {topic} documentation"),
        ChangeType::Refactor => format!("restructure {topic}"),
        ChangeType::Test => format!("update {topic} tests"),
        ChangeType::Chore => format!("update {topic}"),
        ChangeType::Style => format!("format {topic}"),
        ChangeType::Performance => format!("optimize {topic}"),
    }
}

/// The keyword part of `{type}_{keyword}[_{n}]`.
fn pattern_topic(name: &str, change_type: ChangeType) -> Option<String> {
    let rest = name.strip_prefix(change_type.as_str())?.strip_prefix('_')?;
    let rest = match rest.rsplit_once('_') {
        Some((head, n)) if n.chars().all(|c| c.is_ascii_digit()) => head,
        _ => rest,
    };
    (!rest.is_empty() && rest != "changes").then(|| rest.replace('_', " "))
}

fn format_message(change_type: ChangeType, subject: &str) -> String {
    let prefix = change_type.conventional_prefix();
    let budget = MAX_MESSAGE_LEN.saturating_sub(prefix.len() + 2);
    format!("{prefix}: {}", truncate_words(subject, budget))
}

fn truncate_words(text: &str, budget: usize) -> &str {
    if text.chars().count() <= budget {
        return text;
    }
    let cut = text
        .char_indices()
        .nth(budget)
        .map_or(text.len(), |(i, _)| i);
    let clipped = &text[..cut];
    match clipped.rfind(' ') {
        Some(space) if space > 0 => clipped[..space].trim_end(),
        _ => clipped,
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        // Leave acronyms such as "API" alone.
        Some(first) if !chars.clone().next().is_some_and(char::is_uppercase) => {
            first.to_lowercase().chain(chars).collect()
        }
        _ => text.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::analysis::{SemanticPattern, ERROR_PATTERN};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn pattern(name: &str, change_type: ChangeType, files: &[&str]) -> SemanticPattern {
        SemanticPattern {
            pattern: name.to_string(),
            change_type,
            confidence: 0.8,
            files: files.iter().map(|f| (*f).to_string()).collect(),
            keywords: BTreeSet::new(),
        }
    }

    #[test]
    fn single_file_patterns_name_the_file() {
        let p = pattern("bugfix_file1", ChangeType::Bugfix, &["src/file1.rs"]);
        insta::assert_snapshot!(message_for_pattern(&p), @"fix: resolve issue in file1.rs");
    }

    #[test]
    fn multi_file_patterns_use_the_keyword() {
        let p = pattern("feature_parser_2", ChangeType::Feature, &["src/parser/a.rs", "src/parser/b.rs"]);
        insta::assert_snapshot!(message_for_pattern(&p), @"feat: add parser");

        let p = pattern("docs_user_guide", ChangeType::Docs, &["docs/a.md", "docs/b.md"]);
        insta::assert_snapshot!(message_for_pattern(&p), @"docs: update user guide documentation");

        let p = pattern("chore_changes", ChangeType::Chore, &["a.txt", "b.txt"]);
        insta::assert_snapshot!(message_for_pattern(&p), @"chore: update project files");
    }

    #[test]
    fn sentinel_pattern_asks_for_review() {
        let p = SemanticPattern::error_sentinel(ERROR_PATTERN, BTreeSet::new());
        insta::assert_snapshot!(
            message_for_pattern(&p),
            @"chore: review changes manually (analysis unavailable)"
        );
    }

    #[test]
    fn description_messages() {
        let classifier = ChangeClassifier::default();
        insta::assert_snapshot!(
            message_for_description(&classifier, "Fix the crash on empty input.", &[]),
            @"fix: fix the crash on empty input"
        );
        insta::assert_snapshot!(
            message_for_description(&classifier, "docs(api): API reference", &[]),
            @"docs: API reference"
        );
        insta::assert_snapshot!(
            message_for_description(&classifier, "", &["src/io.rs".to_string()]),
            @"chore: update io.rs"
        );
    }

    #[test]
    fn long_subjects_are_cut_on_word_boundaries() {
        let long = "word ".repeat(30);
        let p = pattern(&format!("refactor_{}", "x".repeat(3)), ChangeType::Refactor, &["a", "b"]);
        assert_eq!(message_for_pattern(&p), "refactor: restructure xxx");

        let msg = message_for_description(&ChangeClassifier::default(), &long, &[]);
        assert!(msg.len() <= MAX_MESSAGE_LEN);
        assert!(msg.starts_with("chore: word word"));
        assert!(!msg.ends_with(' '));
    }

    #[test]
    fn parse_prefix_handles_scope_and_bang() {
        assert_eq!(parse_prefix("feat(api)!: drop v1"), Some(ChangeType::Feature));
        assert_eq!(parse_prefix("perf: faster"), Some(ChangeType::Performance));
        assert_eq!(parse_prefix("feature: nope"), None);
        assert_eq!(parse_prefix("no colon"), None);
    }

    fn any_change_type() -> impl Strategy<Value = ChangeType> {
        prop::sample::select(ChangeType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn every_message_has_a_known_prefix(
            change_type in any_change_type(),
            keyword in "[a-z]{1,12}(_[a-z]{1,8}){0,3}",
            files in prop::collection::btree_set("[a-z]{1,8}/[a-z]{1,8}\\.rs", 1..5),
        ) {
            let p = SemanticPattern {
                pattern: format!("{}_{keyword}", change_type.as_str()),
                change_type,
                confidence: 0.5,
                files,
                keywords: BTreeSet::new(),
            };
            let message = message_for_pattern(&p);
            let prefix = message.split(':').next().unwrap();
            prop_assert!(["feat", "fix", "docs", "style", "refactor", "perf", "test", "chore"].contains(&prefix));
            prop_assert_eq!(parse_prefix(&message), Some(change_type));
            prop_assert!(message.chars().count() <= MAX_MESSAGE_LEN);
        }
    }
}
