//! Dependency names referenced by added lines.
//!
//! Import statements and manifest entries are matched line by line with
//! per-language patterns. This is a text scan, not a resolver: it only has to
//! be good enough to hint at which other packages a change leans on.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::diff::{DiffLineKind, ParsedFileDiff};

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static RUST_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:use\s+(?:::)?|extern\s+crate\s+)([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\bfrom\s+|\bimport\s+|\brequire\s*\(\s*)['"]([^'"]+)['"]"#).unwrap()
});

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:from\s+([A-Za-z_][A-Za-z0-9_]*)[\w.]*\s+import\b|import\s+([A-Za-z_][A-Za-z0-9_]*))").unwrap()
});

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static GO_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:import\s+)?(?:[A-Za-z_.]+\s+)?"([^"]+)"\s*$"#).unwrap());

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static TOML_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*([A-Za-z0-9_-]+)\s*(?:\.\s*\w+\s*)?="#).unwrap());

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static TOML_SECTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\[([^\]]+)\]").unwrap());

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static JSON_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*"(@?[A-Za-z0-9_.\-/]+)"\s*:\s*"[~^<>=*0-9a-z]"#).unwrap());

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static GO_REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:require\s+)?([a-z0-9.\-]+\.[a-z]+/[^\s]+)\s+v\d").unwrap());

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static REQUIREMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9_.\-]*)\s*(?:\[[^\]]*\])?\s*(?:[=<>!~]=?|$)").unwrap());

/// Rust paths that never name an external crate.
const RUST_BUILTIN: &[&str] = &["crate", "self", "super", "std", "core", "alloc"];

/// Python standard-library modules common enough to be noise.
const PY_BUILTIN: &[&str] = &[
    "os", "sys", "re", "json", "typing", "collections", "itertools", "functools", "pathlib",
    "logging", "subprocess", "dataclasses", "abc", "datetime", "time", "math", "unittest",
    "__future__",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Rust,
    Script,
    Python,
    Go,
    CargoManifest,
    PackageJson,
    GoModule,
    Requirements,
    Other,
}

impl SourceKind {
    fn of(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name {
            "Cargo.toml" => return Self::CargoManifest,
            "package.json" => return Self::PackageJson,
            "go.mod" => return Self::GoModule,
            _ => {}
        }
        if name.starts_with("requirements") && name.ends_with(".txt") {
            return Self::Requirements;
        }
        match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).as_deref() {
            Some("rs") => Self::Rust,
            Some("js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs") => Self::Script,
            Some("py") => Self::Python,
            Some("go") => Self::Go,
            _ => Self::Other,
        }
    }
}

/// Extracts dependency names introduced by a file's added lines.
///
/// Each name maps to a short evidence string such as
/// `import in src/api.rs:12` or `manifest entry in Cargo.toml`. The first
/// piece of evidence for a name wins.
pub fn extract_dependencies(file: &ParsedFileDiff) -> BTreeMap<String, String> {
    let kind = SourceKind::of(&file.path);
    let mut found = BTreeMap::new();
    if kind == SourceKind::Other || file.is_binary {
        return found;
    }

    for hunk in &file.hunks {
        let mut in_dependency_table = false;
        for line in &hunk.lines {
            if kind == SourceKind::CargoManifest {
                if let Some(section) = TOML_SECTION.captures(&line.content) {
                    in_dependency_table = section[1].trim().ends_with("dependencies");
                    continue;
                }
            }
            if line.kind != DiffLineKind::Add {
                continue;
            }
            let location = line
                .new_line
                .map_or_else(|| file.path.clone(), |n| format!("{}:{n}", file.path));

            let hit = match kind {
                SourceKind::Rust => rust_dependency(&line.content)
                    .map(|name| (name, format!("import in {location}"))),
                SourceKind::Script => script_dependency(&line.content)
                    .map(|name| (name, format!("import in {location}"))),
                SourceKind::Python => python_dependency(&line.content)
                    .map(|name| (name, format!("import in {location}"))),
                SourceKind::Go => GO_IMPORT
                    .captures(&line.content)
                    .map(|c| (c[1].to_string(), format!("import in {location}"))),
                SourceKind::CargoManifest if in_dependency_table => TOML_ENTRY
                    .captures(&line.content)
                    .map(|c| (c[1].to_string(), format!("manifest entry in {}", file.path))),
                SourceKind::PackageJson => JSON_ENTRY
                    .captures(&line.content)
                    .filter(|c| !is_package_metadata(&c[1]))
                    .map(|c| (c[1].to_string(), format!("manifest entry in {}", file.path))),
                SourceKind::GoModule => GO_REQUIRE
                    .captures(&line.content)
                    .map(|c| (c[1].to_string(), format!("manifest entry in {}", file.path))),
                SourceKind::Requirements => requirement(&line.content)
                    .map(|name| (name, format!("manifest entry in {}", file.path))),
                SourceKind::CargoManifest | SourceKind::Other => None,
            };

            if let Some((name, evidence)) = hit {
                found.entry(name).or_insert(evidence);
            }
        }
    }
    found
}

fn rust_dependency(line: &str) -> Option<String> {
    let caps = RUST_USE.captures(line)?;
    let name = &caps[1];
    (!RUST_BUILTIN.contains(&name)).then(|| name.to_string())
}

fn script_dependency(line: &str) -> Option<String> {
    let caps = JS_IMPORT.captures(line)?;
    let spec = &caps[1];
    if spec.starts_with('.') || spec.starts_with('/') || spec.starts_with("node:") {
        return None;
    }
    let mut parts = spec.split('/');
    let first = parts.next()?;
    if first.starts_with('@') {
        parts.next().map(|second| format!("{first}/{second}"))
    } else {
        Some(first.to_string())
    }
}

fn python_dependency(line: &str) -> Option<String> {
    let caps = PY_IMPORT.captures(line)?;
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str();
    (!PY_BUILTIN.contains(&name)).then(|| name.to_string())
}

fn requirement(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('-') {
        return None;
    }
    REQUIREMENT.captures(trimmed).map(|c| c[1].to_string())
}

fn is_package_metadata(key: &str) -> bool {
    matches!(
        key,
        "name" | "version" | "description" | "main" | "module" | "types" | "license" | "author"
            | "private" | "type" | "homepage"
    )
}
