//! Generator configuration.
//!
//! Reads `scopegen.toml` from the working directory (or `--config`). Every
//! field is optional; command-line flags win over file values.

use std::path::{Path, PathBuf};

use anyhow::Context;
use scopegen_codegen_lib::{GeneratorOptions, Layout};
use serde::{Deserialize, Serialize};

/// Default config file name.
pub const DEFAULT_CONFIG: &str = "scopegen.toml";

/// Contents of `scopegen.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Topic delimiter (e.g. ".").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,

    /// "split" or "combined".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,

    /// Output root. Each target writes under `<out>/<target default dir>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<PathBuf>,

    /// Targets to generate when `--gen` is not given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,

    /// Version stamped into provenance headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl GeneratorConfig {
    /// Load config from disk. A missing file at the default location is an
    /// empty config; a missing file the user named explicitly is an error.
    pub fn load(path: &Path, explicit: bool) -> anyhow::Result<Self> {
        if !path.exists() && !explicit {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply the file values on top of `base`.
    pub fn apply(&self, mut base: GeneratorOptions) -> GeneratorOptions {
        if let Some(delimiter) = &self.delimiter {
            base.delimiter = delimiter.clone();
        }
        if let Some(layout) = self.layout {
            base.layout = layout;
        }
        if let Some(version) = &self.version {
            base.version = version.clone();
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = GeneratorConfig::parse("").unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = GeneratorConfig::parse(
            r#"
delimiter = "/"
layout = "split"
out = "build/gen"
targets = ["go", "rust"]
version = "2.0.0"
"#,
        )
        .unwrap();
        assert_eq!(config.delimiter.as_deref(), Some("/"));
        assert_eq!(config.layout, Some(Layout::Split));
        assert_eq!(config.out, Some(PathBuf::from("build/gen")));
        assert_eq!(config.targets, vec!["go", "rust"]);
        assert_eq!(config.version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_combined_layout_parses() {
        let config = GeneratorConfig::parse(r#"layout = "combined""#).unwrap();
        assert_eq!(config.layout, Some(Layout::Combined));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(GeneratorConfig::parse(r#"delimeter = ".""#).is_err());
    }

    #[test]
    fn test_apply_overrides_only_set_fields() {
        let base = GeneratorOptions::default();
        let config = GeneratorConfig {
            delimiter: Some("::".into()),
            ..Default::default()
        };
        let options = config.apply(base.clone());
        assert_eq!(options.delimiter, "::");
        assert_eq!(options.version, base.version);
        assert_eq!(options.layout, Layout::Split);
    }

    #[test]
    fn test_missing_default_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        assert_eq!(GeneratorConfig::load(&path, false).unwrap(), GeneratorConfig::default());
        assert!(GeneratorConfig::load(&path, true).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        std::fs::write(&path, "targets = [\"java\"]\n").unwrap();
        let config = GeneratorConfig::load(&path, true).unwrap();
        assert_eq!(config.targets, vec!["java"]);
    }
}
