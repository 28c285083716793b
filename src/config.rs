use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

/// Invalid configuration is fatal at startup, before any scanning begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown detector in [detectors]: {0}")]
    UnknownDetector(String),
    #[error("scan.concurrency must be at least 1")]
    InvalidConcurrency,
}

/// Root configuration structure, deserialized from `.chainmap/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-detector enable toggles, keyed by detector name. Detectors not
    /// listed stay enabled.
    pub detectors: BTreeMap<String, bool>,
    pub scan: ScanConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory names pruned during the repository walk.
    pub ignore: Vec<String>,
    /// Bound on concurrent correlator requests per feed.
    pub concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            ignore: [
                "node_modules",
                "vendor",
                ".git",
                "__pycache__",
                "dist",
                "build",
                ".venv",
                "venv",
                "target",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            concurrency: 8,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }
}

/// Load the scan configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<repo_path>/.chainmap/config.toml`
/// 3. `~/.config/chainmap/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(repo_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        return toml::from_str(&content).with_context(|| format!("parsing {}", path.display()));
    }

    let project_config = repo_path.join(".chainmap").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return toml::from_str(&content)
            .with_context(|| format!("parsing {}", project_config.display()));
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("chainmap").join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return toml::from_str(&content)
                .with_context(|| format!("parsing {}", home_config.display()));
        }
    }

    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.detectors.is_empty());
        assert!(config.scan.ignore.iter().any(|d| d == "node_modules"));
    }

    #[test]
    fn test_load_config_override() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
[detectors]
native_module = false

[scan]
concurrency = 2
"#
        )
        .unwrap();
        let config = load_config(Path::new("/nonexistent"), Some(f.path())).unwrap();
        assert_eq!(config.detectors.get("native_module"), Some(&false));
        assert_eq!(config.scan.concurrency, 2);
        // Unset sections keep defaults.
        assert!(config.scan.ignore.iter().any(|d| d == ".git"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = Config {
            scan: ScanConfig {
                concurrency: 0,
                ..ScanConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency)
        ));
    }

    #[test]
    fn test_malformed_config_is_fatal() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "[detectors\nbroken").unwrap();
        assert!(load_config(Path::new("/nonexistent"), Some(f.path())).is_err());
    }
}
