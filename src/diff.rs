//! Unified diff parsing and per-file splitting.

pub mod parser;
pub mod split;

pub use parser::{
    parse_unified_diff, DiffHunk, DiffLine, DiffLineKind, FileChangeKind, ParsedFileDiff,
};
pub use split::{split_by_file, FileDiff};
