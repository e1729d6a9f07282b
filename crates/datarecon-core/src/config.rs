//! Configuration schema (datarecon.toml)
//!
//! Connections are plain, caller-owned configuration: there is no global
//! connection state anywhere in the workspace. Every connection setting can
//! be overridden from the environment (`SOURCE_*` / `TARGET_*`), so secrets
//! can stay out of the file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One side's connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backend type (postgres, snowflake)
    #[serde(rename = "type")]
    pub backend: String,

    /// Connection settings (backend-specific)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Look up a setting, preferring `{prefix}_{KEY}` from the environment
    ///
    /// `prefix` is `SOURCE` or `TARGET`, so e.g. `SOURCE_PASSWORD` overrides
    /// the `password` key of the `[source]` section.
    pub fn setting(&self, prefix: &str, key: &str) -> Option<String> {
        let env_key = format!("{}_{}", prefix, key.to_uppercase());
        std::env::var(env_key)
            .ok()
            .or_else(|| self.settings.get(key).cloned())
    }

    /// Like [`setting`](Self::setting), but missing settings are an error
    pub fn require(&self, prefix: &str, key: &str) -> Result<String, ConfigError> {
        self.setting(prefix, key)
            .ok_or_else(|| ConfigError::MissingSetting {
                section: prefix.to_lowercase(),
                key: key.to_string(),
            })
    }
}

fn default_chunk_size() -> usize {
    10_000
}

fn default_output() -> PathBuf {
    PathBuf::from("datarecon-report.json")
}

/// Comparison parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Query to run against the source side
    pub source_query: String,

    /// Query to run against the target side
    pub target_query: String,

    /// Columns whose concatenated values identify a row (non-empty)
    pub key_columns: Vec<String>,

    /// Columns to compare; defaults to the intersection of both sides
    /// minus the key columns
    #[serde(default)]
    pub compare_columns: Option<Vec<String>>,

    /// Number of common keys processed per batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Report output path
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Source-side connection
    pub source: ConnectionConfig,

    /// Target-side connection
    pub target: ConnectionConfig,

    /// Comparison parameters
    pub comparison: ComparisonConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("missing required setting '{key}' in [{section}] section")]
    MissingSetting { section: String, key: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
        [source]
        type = "postgres"
        host = "localhost"
        port = "5432"
        dbname = "ops"
        user = "recon"
        password = "secret"

        [target]
        type = "snowflake"
        account = "xy12345"
        username = "recon"
        password = "secret"
        warehouse = "COMPUTE_WH"

        [comparison]
        source_query = "SELECT * FROM snapshot"
        target_query = "SELECT * FROM OPS_PUB.SNAPSHOT"
        key_columns = ["ID"]
    "#;

    #[test]
    fn parse_sample_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.source.backend, "postgres");
        assert_eq!(config.target.backend, "snowflake");
        assert_eq!(config.comparison.key_columns, vec!["ID"]);
        assert_eq!(config.comparison.chunk_size, 10_000);
        assert_eq!(config.comparison.compare_columns, None);
        assert_eq!(
            config.comparison.output,
            PathBuf::from("datarecon-report.json")
        );
    }

    #[test]
    fn settings_resolve_from_file() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(
            config.source.setting("SOURCE", "host"),
            Some("localhost".to_string())
        );
        assert_eq!(config.source.setting("SOURCE", "nonexistent"), None);
    }

    #[test]
    fn environment_overrides_file() {
        let config = Config::from_toml(SAMPLE).unwrap();
        std::env::set_var("TARGET_ROLE", "ANALYST");
        assert_eq!(
            config.target.setting("TARGET", "role"),
            Some("ANALYST".to_string())
        );
        std::env::remove_var("TARGET_ROLE");
    }

    #[test]
    fn missing_setting_is_an_error() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let err = config.source.require("SOURCE", "sslcert").unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting { .. }));
        assert_eq!(
            err.to_string(),
            "missing required setting 'sslcert' in [source] section"
        );
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let toml = toml::to_string(&config).unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}
