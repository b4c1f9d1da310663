//! Serialization of command output and proposal files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{de::DeserializeOwned, Serialize};
use yaml_rust_davvid::YamlEmitter;

/// Output encodings offered by the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML with block-style multi-line strings.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

/// Renders `data` in the requested format.
pub fn render<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => to_yaml(data),
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
            out.push('\n');
            Ok(out)
        }
    }
}

/// Serializes to YAML, emitting multi-line strings (diffs) as block scalars.
pub fn to_yaml<T: Serialize>(data: &T) -> Result<String> {
    let serde_value = serde_yaml::to_value(data).context("Failed to serialize to serde value")?;
    let yaml = convert_serde_to_yaml_rust(&serde_value);

    let mut output = String::new();
    let mut emitter = YamlEmitter::new(&mut output);
    emitter.multiline_strings(true);
    emitter.dump(&yaml).context("Failed to emit YAML")?;
    output.push('\n');
    Ok(output)
}

fn convert_serde_to_yaml_rust(value: &serde_yaml::Value) -> yaml_rust_davvid::Yaml {
    use yaml_rust_davvid::Yaml;

    match value {
        serde_yaml::Value::Null => Yaml::Null,
        serde_yaml::Value::Bool(b) => Yaml::Boolean(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Yaml::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Yaml::Real(f.to_string())
            } else {
                Yaml::String(n.to_string())
            }
        }
        serde_yaml::Value::String(s) => Yaml::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            Yaml::Array(seq.iter().map(convert_serde_to_yaml_rust).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut hash = yaml_rust_davvid::yaml::Hash::new();
            for (k, v) in map {
                hash.insert(convert_serde_to_yaml_rust(k), convert_serde_to_yaml_rust(v));
            }
            Yaml::Hash(hash)
        }
        serde_yaml::Value::Tagged(tagged) => convert_serde_to_yaml_rust(&tagged.value),
    }
}

/// Reads a YAML or JSON file (JSON parses as YAML).
pub fn read_structured_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse file: {}", path.display()))
}

/// Writes `data` to `path` in the requested format.
pub fn write_file<T: Serialize, P: AsRef<Path>>(data: &T, path: P, format: OutputFormat) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, render(data, format)?)
        .with_context(|| format!("Failed to write file: {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        commit_range: String,
        diff: String,
        confidence: f64,
    }

    fn sample() -> Sample {
        Sample {
            commit_range: "abc123..def456".to_string(),
            diff: "@@ -1 +1 @@\n-old\n+new\n".to_string(),
            confidence: 0.75,
        }
    }

    #[test]
    fn yaml_uses_camel_case_keys() {
        let yaml = to_yaml(&sample()).unwrap();
        assert!(yaml.contains("commitRange: abc123..def456"));
        let back: Sample = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.diff, sample().diff);
    }

    #[test]
    fn yaml_and_json_files_read_back() {
        let dir = TempDir::new().unwrap();
        for (name, format) in [("p.yaml", OutputFormat::Yaml), ("p.json", OutputFormat::Json)] {
            let path = dir.path().join(name);
            write_file(&sample(), &path, format).unwrap();
            let back: Sample = read_structured_file(&path).unwrap();
            assert_eq!(back, sample());
        }
    }
}
