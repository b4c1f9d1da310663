//! Per-file slices of a unified diff.

use serde::{Deserialize, Serialize};

use super::parser::{parse_unified_diff, FileChangeKind, ParsedFileDiff};

/// A per-file slice of a unified diff, as exchanged with backends and callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Path of the file after the change.
    pub path: String,
    /// Add, modify or delete.
    pub change_type: FileChangeKind,
    /// Raw text of this file's diff (header + all hunks).
    #[serde(default)]
    pub diff: String,
}

impl FileDiff {
    /// Parses this slice into its structured form.
    ///
    /// A slice with no recognizable header (e.g. a caller-built record with
    /// only a path) still yields a record with the declared path and kind.
    pub fn parse(&self) -> ParsedFileDiff {
        parse_unified_diff(&self.diff)
            .into_iter()
            .next()
            .map(|mut parsed| {
                parsed.path.clone_from(&self.path);
                parsed.change_type = self.change_type;
                parsed
            })
            .unwrap_or_else(|| ParsedFileDiff {
                path: self.path.clone(),
                old_path: None,
                change_type: self.change_type,
                is_binary: false,
                additions: 0,
                deletions: 0,
                hunks: Vec::new(),
                malformed: false,
                raw: self.diff.clone(),
            })
    }
}

impl From<&ParsedFileDiff> for FileDiff {
    fn from(parsed: &ParsedFileDiff) -> Self {
        Self {
            path: parsed.path.clone(),
            change_type: parsed.change_type,
            diff: parsed.raw.clone(),
        }
    }
}

/// Splits a flat unified diff into one [`FileDiff`] per file section.
///
/// An empty or whitespace-only input returns an empty `Vec`.
pub fn split_by_file(diff: &str) -> Vec<FileDiff> {
    parse_unified_diff(diff).iter().map(FileDiff::from).collect()
}
