//! Configuration management for relmap

use config::{Config, ConfigError, Environment, File};
use relmap_core::{FlushOptions, MappingOptions, RelmapError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for relmap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelmapConfig {
    /// Mapping-model boot options
    pub mapping: MappingOptions,

    /// Flush planning options
    pub flush: FlushOptions,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install a Prometheus recorder for the `metrics` facade
    pub enabled: bool,
}

const ENV_PREFIX: &str = "RELMAP";

impl RelmapConfig {
    /// Load configuration from `relmap.toml` (if present) and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("relmap.toml")
    }

    /// Load configuration from a specific file; environment variables win
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&RelmapConfig::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from environment variables only
    pub fn load_from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&RelmapConfig::default())?)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Reject values the rest of the stack cannot act on
    pub fn validate(&self) -> Result<(), RelmapError> {
        let suffix = &self.mapping.foreign_key_suffix;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RelmapError::ConfigError(format!(
                "mapping.foreign_key_suffix `{suffix}` must be a non-empty identifier fragment"
            )));
        }
        match self.observability.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(RelmapError::ConfigError(format!(
                    "unknown log level `{other}`"
                )))
            }
        }
        match self.observability.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(RelmapError::ConfigError(format!("unknown log format `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RelmapConfig::default();
        assert!(config.mapping.validate_identifiers);
        assert_eq!(config.mapping.foreign_key_suffix, "_id");
        assert!(config.flush.skip_empty_updates);
        assert!(!config.observability.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = RelmapConfig::default();
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: RelmapConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);

        // missing sections fall back to defaults
        let partial: RelmapConfig =
            serde_json::from_str(r#"{"flush":{"skip_empty_updates":false}}"#).unwrap();
        assert!(!partial.flush.skip_empty_updates);
        assert_eq!(partial.mapping, MappingOptions::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("relmap-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[mapping]\nforeign_key_suffix = \"_fk\"\n").unwrap();
        writeln!(file, "[observability.logging]\nformat = \"pretty\"").unwrap();

        let config = RelmapConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.mapping.foreign_key_suffix, "_fk");
        assert!(config.mapping.validate_identifiers);
        assert_eq!(config.observability.logging.format, "pretty");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = RelmapConfig::load_from_file("/nonexistent/relmap.toml").unwrap();
        assert_eq!(config.flush, FlushOptions::default());
    }

    #[test]
    fn test_validate() {
        let mut config = RelmapConfig::default();
        config.mapping.foreign_key_suffix = "-id".into();
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Configuration);

        let mut config = RelmapConfig::default();
        config.observability.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }
}
