//! Keyword extraction from file paths.

use std::collections::BTreeSet;

use crate::diff::ParsedFileDiff;

/// Path components too generic to tell two changes apart.
const GENERIC_SEGMENTS: &[&str] = &[
    "src", "lib", "libs", "app", "apps", "main", "mod", "index", "pkg", "internal", "cmd",
    "source", "sources", "include", "crates", "packages", "common", "util", "utils", "the",
    "and", "for",
];

/// Extracts the normalized keyword set of a file from its path.
///
/// Directory names and the file stem are split on punctuation and camelCase
/// boundaries, lowercased, and filtered of generic layout words and tokens
/// shorter than three characters.
pub fn path_keywords(path: &str) -> BTreeSet<String> {
    let mut segments: Vec<&str> = path.split('/').collect();
    if let Some(name) = segments.pop() {
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        };
        segments.push(stem);
    }

    segments
        .into_iter()
        .flat_map(split_identifier)
        .filter(|w| w.len() >= 3 && !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !GENERIC_SEGMENTS.contains(&w.as_str()))
        .collect()
}

/// Keywords of a parsed file plus the trigger words its classification found.
pub fn file_keywords(file: &ParsedFileDiff, triggers: &BTreeSet<String>) -> BTreeSet<String> {
    let mut keywords = path_keywords(&file.path);
    keywords.extend(triggers.iter().cloned());
    keywords
}

/// Jaccard similarity of two keyword sets; zero when both are empty.
pub fn overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Splits `fooBar_baz-qux` into `foo`, `bar`, `baz`, `qux`.
fn split_identifier(segment: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in segment.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
