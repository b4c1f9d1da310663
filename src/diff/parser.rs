//! Best-effort unified diff parsing into per-file, per-hunk, per-line records.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker that begins a per-file section in git diff output.
const GIT_DIFF_MARKER: &str = "diff --git ";

/// Any line beginning a new file record.
const DIFF_MARKER: &str = "diff ";

/// Path used by diff tools for the missing side of an add or delete.
const DEV_NULL: &str = "/dev/null";

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$").unwrap()
});

/// How a file was touched by a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    /// The file is new.
    Add,
    /// The file existed before and after.
    Modify,
    /// The file was removed.
    Delete,
}

/// Role of a single line inside a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    /// Unchanged line shown for context.
    Context,
    /// Line added by the change.
    Add,
    /// Line removed by the change.
    Delete,
}

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Line role.
    #[serde(rename = "type")]
    pub kind: DiffLineKind,
    /// Line text without the leading marker character.
    pub content: String,
    /// Line number in the old file, when the line exists there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_line: Option<u32>,
    /// Line number in the new file, when the line exists there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_line: Option<u32>,
}

/// A contiguous block of changes within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// First line of the hunk in the old file.
    pub old_start: u32,
    /// Number of old-file lines covered.
    pub old_count: u32,
    /// First line of the hunk in the new file.
    pub new_start: u32,
    /// Number of new-file lines covered.
    pub new_count: u32,
    /// The `@@ ... @@` header line as it appeared.
    pub header: String,
    /// Body lines in order.
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Number of added lines in this hunk.
    pub fn additions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == DiffLineKind::Add)
            .count()
    }

    /// Number of removed lines in this hunk.
    pub fn deletions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind == DiffLineKind::Delete)
            .count()
    }
}

/// Structured form of one file's section of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFileDiff {
    /// Path after the change (before it, for deletions).
    pub path: String,
    /// Path before the change; `None` for added files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    /// Add, modify or delete.
    pub change_type: FileChangeKind,
    /// Whether git reported the file as binary.
    pub is_binary: bool,
    /// Total added lines across hunks.
    pub additions: usize,
    /// Total removed lines across hunks.
    pub deletions: usize,
    /// Hunks in file order.
    pub hunks: Vec<DiffHunk>,
    /// Line numbering ran past what a hunk header can address; line counts
    /// are still exact but later lines carry no numbers.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub malformed: bool,
    /// Raw text of this file's section, header included.
    #[serde(skip)]
    pub raw: String,
}

impl ParsedFileDiff {
    /// Lines added or removed, in hunk order.
    pub fn changed_lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .filter(|l| l.kind != DiffLineKind::Context)
    }

    /// Text of the added lines, in hunk order.
    pub fn added_lines(&self) -> impl Iterator<Item = &str> {
        self.hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .filter(|l| l.kind == DiffLineKind::Add)
            .map(|l| l.content.as_str())
    }

    /// Lowercased file extension, if the file name has one.
    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Folds a later section for the same path into this one.
    pub fn absorb(&mut self, later: ParsedFileDiff) {
        self.change_type = match (self.change_type, later.change_type) {
            (_, FileChangeKind::Delete) => FileChangeKind::Delete,
            (FileChangeKind::Add, _) => FileChangeKind::Add,
            (_, kind) => kind,
        };
        self.is_binary |= later.is_binary;
        self.malformed |= later.malformed;
        self.additions += later.additions;
        self.deletions += later.deletions;
        self.hunks.extend(later.hunks);
        self.raw.push_str(&later.raw);
    }

    /// True when the file was renamed as part of the change.
    pub fn is_rename(&self) -> bool {
        self.old_path.as_deref().is_some_and(|old| old != self.path)
    }
}

/// Position within the body of the hunk currently being read.
///
/// Line numbers become `None` once they would overflow.
struct HunkCursor {
    old_remaining: u32,
    new_remaining: u32,
    old_line: Option<u32>,
    new_line: Option<u32>,
}

impl HunkCursor {
    fn expects_more(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }
}

/// Moves to the next line number, flagging the record on overflow.
fn advance(line: &mut Option<u32>, malformed: &mut bool) {
    if let Some(n) = *line {
        *line = n.checked_add(1);
        if line.is_none() {
            *malformed = true;
        }
    }
}

/// Accumulates the header facts of one file until it is flushed.
#[derive(Default)]
struct FileRecord {
    header_old: Option<String>,
    header_new: Option<String>,
    old_path: Option<String>,
    new_path: Option<String>,
    old_is_null: bool,
    new_is_null: bool,
    explicit_kind: Option<FileChangeKind>,
    rename_from: Option<String>,
    rename_to: Option<String>,
    is_binary: bool,
    saw_old_header: bool,
    malformed: bool,
    hunks: Vec<DiffHunk>,
    raw: String,
}

impl FileRecord {
    fn from_diff_line(line: &str) -> Self {
        let (header_old, header_new) = paths_from_diff_header(line);
        Self {
            header_old,
            header_new,
            ..Self::default()
        }
    }

    fn finish(self) -> Option<ParsedFileDiff> {
        let new_side = if self.new_is_null {
            None
        } else {
            self.new_path
                .clone()
                .or(self.rename_to.clone())
                .or(self.header_new.clone())
        };
        let old_side = if self.old_is_null {
            None
        } else {
            self.old_path
                .clone()
                .or(self.rename_from.clone())
                .or(self.header_old.clone())
        };

        let path = new_side.clone().or(old_side.clone())?;

        let change_type = match self.explicit_kind {
            Some(kind) => kind,
            None if self.old_is_null => FileChangeKind::Add,
            None if self.new_is_null => FileChangeKind::Delete,
            None => FileChangeKind::Modify,
        };

        let old_path = match change_type {
            FileChangeKind::Add => None,
            _ => old_side.or(Some(path.clone())),
        };

        let additions = self.hunks.iter().map(DiffHunk::additions).sum();
        let deletions = self.hunks.iter().map(DiffHunk::deletions).sum();

        Some(ParsedFileDiff {
            path,
            old_path,
            change_type,
            is_binary: self.is_binary,
            additions,
            deletions,
            hunks: self.hunks,
            malformed: self.malformed,
            raw: self.raw,
        })
    }
}

/// Parses unified diff text into one record per file.
///
/// Parsing never fails: malformed hunk headers are skipped, lines outside a
/// file section are ignored, and empty input yields an empty `Vec`.
pub fn parse_unified_diff(input: &str) -> Vec<ParsedFileDiff> {
    let mut files = Vec::new();
    let mut current: Option<FileRecord> = None;
    let mut cursor: Option<HunkCursor> = None;

    for line in input.lines() {
        if line.starts_with(DIFF_MARKER) {
            flush(&mut files, current.take());
            cursor = None;
            let mut record = FileRecord::from_diff_line(line);
            push_raw(&mut record.raw, line);
            current = Some(record);
            continue;
        }

        if let Some(active) = cursor.as_mut() {
            let consumed = match current.as_mut() {
                Some(record) => {
                    let consumed = read_body_line(active, record, line);
                    if consumed {
                        push_raw(&mut record.raw, line);
                    }
                    consumed
                }
                None => false,
            };
            if consumed {
                continue;
            }
            cursor = None;
        }

        // A `---` header without a preceding `diff` line starts a new file
        // in plain unified diffs.
        if line.starts_with("--- ") {
            let starts_new = current
                .as_ref()
                .map_or(true, |r| r.saw_old_header || !r.hunks.is_empty());
            if starts_new {
                flush(&mut files, current.take());
                current = Some(FileRecord::default());
            }
        }

        let Some(record) = current.as_mut() else {
            continue;
        };
        push_raw(&mut record.raw, line);

        if let Some(rest) = line.strip_prefix("--- ") {
            record.saw_old_header = true;
            match side_path(rest, "a/") {
                Some(path) => record.old_path = Some(path),
                None => record.old_is_null = true,
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            match side_path(rest, "b/") {
                Some(path) => record.new_path = Some(path),
                None => record.new_is_null = true,
            }
        } else if line.starts_with("@@") {
            if record.is_binary {
                continue;
            }
            match parse_hunk_header(line) {
                Some(hunk) => {
                    cursor = Some(HunkCursor {
                        old_remaining: hunk.old_count,
                        new_remaining: hunk.new_count,
                        old_line: Some(hunk.old_start),
                        new_line: Some(hunk.new_start),
                    });
                    record.hunks.push(hunk);
                }
                None => debug!(header = line, "Skipping malformed hunk header"),
            }
        } else if line.starts_with("new file mode") {
            record.explicit_kind = Some(FileChangeKind::Add);
        } else if line.starts_with("deleted file mode") {
            record.explicit_kind = Some(FileChangeKind::Delete);
        } else if let Some(from) = line.strip_prefix("rename from ") {
            record.rename_from = Some(from.to_string());
        } else if let Some(to) = line.strip_prefix("rename to ") {
            record.rename_to = Some(to.to_string());
        } else if line.starts_with("Binary files ") && line.ends_with(" differ") {
            record.is_binary = true;
            if line.starts_with("Binary files /dev/null and ") {
                record.old_is_null = true;
            } else if line.ends_with(" and /dev/null differ") {
                record.new_is_null = true;
            }
        } else if line.starts_with("GIT binary patch") {
            record.is_binary = true;
        }
    }

    flush(&mut files, current);
    debug!(files = files.len(), "Parsed unified diff");
    files
}

/// Consumes one hunk body line, returning false when the line ends the hunk.
fn read_body_line(cursor: &mut HunkCursor, record: &mut FileRecord, line: &str) -> bool {
    let Some(hunk) = record.hunks.last_mut() else {
        return false;
    };

    // Once the declared counts are used up, only unambiguous body lines
    // continue the hunk; headers of the next section end it.
    if !cursor.expects_more() {
        let continues = (line.starts_with('+') && !line.starts_with("+++ "))
            || (line.starts_with('-') && !line.starts_with("--- "))
            || line.starts_with(' ')
            || line.starts_with('\\');
        if !continues {
            return false;
        }
    }

    let mut chars = line.chars();
    match chars.next() {
        Some('+') => {
            hunk.lines.push(DiffLine {
                kind: DiffLineKind::Add,
                content: chars.as_str().to_string(),
                old_line: None,
                new_line: cursor.new_line,
            });
            advance(&mut cursor.new_line, &mut record.malformed);
            cursor.new_remaining = cursor.new_remaining.saturating_sub(1);
        }
        Some('-') => {
            hunk.lines.push(DiffLine {
                kind: DiffLineKind::Delete,
                content: chars.as_str().to_string(),
                old_line: cursor.old_line,
                new_line: None,
            });
            advance(&mut cursor.old_line, &mut record.malformed);
            cursor.old_remaining = cursor.old_remaining.saturating_sub(1);
        }
        Some(' ') | None => {
            hunk.lines.push(DiffLine {
                kind: DiffLineKind::Context,
                content: chars.as_str().to_string(),
                old_line: cursor.old_line,
                new_line: cursor.new_line,
            });
            advance(&mut cursor.old_line, &mut record.malformed);
            advance(&mut cursor.new_line, &mut record.malformed);
            cursor.old_remaining = cursor.old_remaining.saturating_sub(1);
            cursor.new_remaining = cursor.new_remaining.saturating_sub(1);
        }
        // "\ No newline at end of file"
        Some('\\') => {}
        Some(_) => return false,
    }
    true
}

fn flush(files: &mut Vec<ParsedFileDiff>, record: Option<FileRecord>) {
    if let Some(parsed) = record.and_then(FileRecord::finish) {
        files.push(parsed);
    }
}

fn push_raw(raw: &mut String, line: &str) {
    raw.push_str(line);
    raw.push('\n');
}

/// Parses a `@@ -a,b +c,d @@` header; counts default to 1 when omitted.
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let caps = HUNK_HEADER.captures(line)?;
    let number = |idx: usize, default: u32| -> Option<u32> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    Some(DiffHunk {
        old_start: number(1, 0)?,
        old_count: number(2, 1)?,
        new_start: number(3, 0)?,
        new_count: number(4, 1)?,
        header: line.to_string(),
        lines: Vec::new(),
    })
}

/// Extracts a path from a `---`/`+++` header, `None` for `/dev/null`.
fn side_path(rest: &str, prefix: &str) -> Option<String> {
    // Some tools append a tab and a timestamp after the path.
    let path = rest.split('\t').next().unwrap_or(rest).trim_end();
    if path == DEV_NULL {
        return None;
    }
    Some(path.strip_prefix(prefix).unwrap_or(path).to_string())
}

/// Extracts the old and new paths from a `diff` line.
fn paths_from_diff_header(line: &str) -> (Option<String>, Option<String>) {
    if let Some(rest) = line.strip_prefix(GIT_DIFF_MARKER) {
        // Format: "diff --git a/old_path b/new_path". The last " b/" wins so
        // paths containing spaces survive.
        if let Some(b_pos) = rest.rfind(" b/") {
            let old = rest[..b_pos].strip_prefix("a/").unwrap_or(&rest[..b_pos]);
            let new = &rest[b_pos + 3..];
            return (Some(old.to_string()), Some(new.to_string()));
        }
        return (None, Some(rest.to_string()));
    }

    // "diff -u old new" style: the last two tokens are the paths.
    let tokens: Vec<&str> = line.split_whitespace().filter(|t| !t.starts_with('-')).collect();
    match tokens.as_slice() {
        [.., old, new] if *old != "diff" => (Some((*old).to_string()), Some((*new).to_string())),
        _ => (None, None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // ── test helpers ────────────────────────────────────────────

    fn make_file_header(path: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n\
             index abc1234..def5678 100644\n\
             --- a/{path}\n\
             +++ b/{path}\n"
        )
    }

    fn naive_counts(diff: &str) -> (usize, usize) {
        let adds = diff
            .lines()
            .filter(|l| l.starts_with('+') && !l.starts_with("+++ "))
            .count();
        let dels = diff
            .lines()
            .filter(|l| l.starts_with('-') && !l.starts_with("--- "))
            .count();
        (adds, dels)
    }

    // ── parse_unified_diff ──────────────────────────────────────

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_unified_diff("").is_empty());
        assert!(parse_unified_diff("   \n\n").is_empty());
    }

    #[test]
    fn text_without_markers_yields_nothing() {
        assert!(parse_unified_diff("just some words\nand more\n").is_empty());
    }

    #[test]
    fn single_modified_file() {
        let diff = format!(
            "{}@@ -1,3 +1,4 @@ fn main()\n fn main() {{\n-    old();\n+    new();\n+    more();\n }}\n",
            make_file_header("src/main.rs")
        );
        let files = parse_unified_diff(&diff);
        assert_eq!(files.len(), 1);

        let file = &files[0];
        assert_eq!(file.path, "src/main.rs");
        assert_eq!(file.old_path.as_deref(), Some("src/main.rs"));
        assert_eq!(file.change_type, FileChangeKind::Modify);
        assert_eq!(file.additions, 2);
        assert_eq!(file.deletions, 1);
        assert_eq!(file.hunks.len(), 1);

        let hunk = &file.hunks[0];
        assert_eq!(
            (hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count),
            (1, 3, 1, 4)
        );
        assert_eq!(hunk.lines.len(), 5);
        assert_eq!(hunk.lines[1].kind, DiffLineKind::Delete);
        assert_eq!(hunk.lines[1].old_line, Some(2));
        assert_eq!(hunk.lines[2].new_line, Some(2));
        assert_eq!(hunk.lines[4].old_line, Some(3));
        assert_eq!(hunk.lines[4].new_line, Some(4));
        assert_eq!(file.raw, diff);
    }

    #[test]
    fn new_and_deleted_files() {
        let diff = "diff --git a/new.rs b/new.rs\n\
                    new file mode 100644\n\
                    index 0000000..abc1234\n\
                    --- /dev/null\n\
                    +++ b/new.rs\n\
                    @@ -0,0 +1,2 @@\n\
                    +fn a() {}\n\
                    +fn b() {}\n\
                    diff --git a/gone.rs b/gone.rs\n\
                    deleted file mode 100644\n\
                    index abc1234..0000000\n\
                    --- a/gone.rs\n\
                    +++ /dev/null\n\
                    @@ -1 +0,0 @@\n\
                    -fn c() {}\n";

        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "new.rs");
        assert_eq!(files[0].change_type, FileChangeKind::Add);
        assert_eq!(files[0].old_path, None);
        assert_eq!(files[0].additions, 2);

        assert_eq!(files[1].path, "gone.rs");
        assert_eq!(files[1].change_type, FileChangeKind::Delete);
        assert_eq!(files[1].deletions, 1);
        assert_eq!(files[1].hunks[0].old_count, 1);
    }

    #[test]
    fn binary_file_has_no_hunks() {
        let diff = "diff --git a/image.png b/image.png\n\
                    new file mode 100644\n\
                    index 0000000..abc1234\n\
                    Binary files /dev/null and b/image.png differ\n";
        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 1);
        assert!(files[0].is_binary);
        assert!(files[0].hunks.is_empty());
        assert_eq!(files[0].change_type, FileChangeKind::Add);
    }

    #[test]
    fn rename_keeps_old_path() {
        let diff = "diff --git a/old_name.rs b/new_name.rs\n\
                    similarity index 95%\n\
                    rename from old_name.rs\n\
                    rename to new_name.rs\n\
                    index abc1234..def5678 100644\n\
                    --- a/old_name.rs\n\
                    +++ b/new_name.rs\n\
                    @@ -1,1 +1,1 @@\n\
                    -// old\n\
                    +// new\n";
        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "new_name.rs");
        assert_eq!(files[0].old_path.as_deref(), Some("old_name.rs"));
        assert!(files[0].is_rename());
    }

    #[test]
    fn pure_rename_without_hunks() {
        let diff = "diff --git a/a.txt b/b.txt\n\
                    similarity index 100%\n\
                    rename from a.txt\n\
                    rename to b.txt\n";
        let files = parse_unified_diff(diff);
        assert_eq!(files[0].path, "b.txt");
        assert_eq!(files[0].old_path.as_deref(), Some("a.txt"));
        assert_eq!(files[0].change_type, FileChangeKind::Modify);
    }

    #[test]
    fn header_like_text_inside_hunk_is_content() {
        let diff = format!(
            "{}@@ -1,2 +1,2 @@\n--- removed yaml separator\n+++ added marker\n",
            make_file_header("notes.txt")
        );
        let files = parse_unified_diff(&diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].additions, 1);
        assert_eq!(files[0].deletions, 1);
        assert_eq!(files[0].hunks[0].lines[0].content, "-- removed yaml separator");
    }

    #[test]
    fn malformed_hunk_header_is_skipped() {
        let diff = format!(
            "{}@@ -x,y +1 @@\n+ignored\n@@ -1 +1,2 @@\n ctx\n+kept\n",
            make_file_header("a.rs")
        );
        let files = parse_unified_diff(&diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hunks.len(), 1);
        assert_eq!(files[0].additions, 1);
        assert_eq!(files[0].hunks[0].old_count, 1);
    }

    #[test]
    fn line_numbers_at_the_top_of_the_range_do_not_overflow() {
        let diff = format!(
            "{}@@ -4294967295,2 +4294967295,2 @@\n+first\n+second\n ctx\n-gone\n",
            make_file_header("huge.rs")
        );
        let files = parse_unified_diff(&diff);
        assert_eq!(files.len(), 1);

        let file = &files[0];
        assert!(file.malformed);
        assert_eq!((file.additions, file.deletions), naive_counts(&diff));
        let lines = &file.hunks[0].lines;
        assert_eq!(lines[0].new_line, Some(u32::MAX));
        assert_eq!(lines[1].new_line, None);
        assert_eq!(lines[2].old_line, Some(u32::MAX));
        assert_eq!(lines[3].old_line, None);
    }

    #[test]
    fn ordinary_hunks_are_not_malformed() {
        let diff = format!("{}@@ -1 +1,2 @@\n ctx\n+kept\n", make_file_header("a.rs"));
        assert!(!parse_unified_diff(&diff)[0].malformed);
    }

    #[test]
    fn omitted_counts_default_to_one() {
        let hunk = parse_hunk_header("@@ -5 +7 @@").unwrap();
        assert_eq!(
            (hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count),
            (5, 1, 7, 1)
        );
    }

    #[test]
    fn truncated_hunk_keeps_parsed_lines() {
        let diff = format!("{}@@ -1,10 +1,10 @@\n+only line\n", make_file_header("a.rs"));
        let files = parse_unified_diff(&diff);
        assert_eq!(files[0].additions, 1);
    }

    #[test]
    fn no_newline_marker_is_ignored() {
        let diff = format!(
            "{}@@ -1 +1 @@\n-a\n\\ No newline at end of file\n+b\n\\ No newline at end of file\n",
            make_file_header("a.txt")
        );
        let files = parse_unified_diff(&diff);
        assert_eq!(files[0].hunks[0].lines.len(), 2);
    }

    #[test]
    fn headerless_unified_diff() {
        let diff = "--- a/one.txt\n\
                    +++ b/one.txt\n\
                    @@ -1 +1 @@\n\
                    -x\n\
                    +y\n\
                    --- a/two.txt\n\
                    +++ b/two.txt\n\
                    @@ -1 +1,2 @@\n \
                    z\n\
                    +w\n";
        let files = parse_unified_diff(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "one.txt");
        assert_eq!(files[1].path, "two.txt");
        assert_eq!(files[1].additions, 1);
    }

    #[test]
    fn path_with_spaces() {
        let (old, new) = paths_from_diff_header("diff --git a/my file.rs b/my file.rs");
        assert_eq!(old.as_deref(), Some("my file.rs"));
        assert_eq!(new.as_deref(), Some("my file.rs"));
    }

    #[test]
    fn totals_match_naive_count_for_multi_file_diff() {
        let diff = format!(
            "{}@@ -1,2 +1,3 @@\n a\n+b\n-c\n+d\n{}@@ -4,1 +4,0 @@\n-e\n",
            make_file_header("x.rs"),
            make_file_header("y.rs")
        );
        let files = parse_unified_diff(&diff);
        let adds: usize = files.iter().map(|f| f.additions).sum();
        let dels: usize = files.iter().map(|f| f.deletions).sum();
        assert_eq!((adds, dels), naive_counts(&diff));
    }

    #[test]
    fn extension_is_lowercased() {
        let diff = format!("{}@@ -1 +1 @@\n-a\n+b\n", make_file_header("docs/README.MD"));
        let files = parse_unified_diff(&diff);
        assert_eq!(files[0].extension().as_deref(), Some("md"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn body_line() -> impl Strategy<Value = String> {
            prop_oneof![
                "[a-z ]{0,12}".prop_map(|s| format!("+{s}")),
                "[a-z ]{0,12}".prop_map(|s| format!("-{s}")),
                "[a-z ]{0,12}".prop_map(|s| format!(" {s}")),
            ]
        }

        fn file_section(index: usize, body: &[String]) -> String {
            let old = body.iter().filter(|l| !l.starts_with('+')).count();
            let new = body.iter().filter(|l| !l.starts_with('-')).count();
            let mut section = format!(
                "{}@@ -1,{old} +1,{new} @@\n",
                make_file_header(&format!("f{index}.txt"))
            );
            for line in body {
                section.push_str(line);
                section.push('\n');
            }
            section
        }

        proptest! {
            #[test]
            fn totals_match_naive_line_count(
                bodies in prop::collection::vec(prop::collection::vec(body_line(), 1..12), 1..5)
            ) {
                let diff: String = bodies
                    .iter()
                    .enumerate()
                    .map(|(i, body)| file_section(i, body))
                    .collect();

                let files = parse_unified_diff(&diff);
                prop_assert_eq!(files.len(), bodies.len());

                let adds: usize = files.iter().map(|f| f.additions).sum();
                let dels: usize = files.iter().map(|f| f.deletions).sum();
                prop_assert_eq!((adds, dels), naive_counts(&diff));
            }
        }
    }
}
