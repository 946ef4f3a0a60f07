//! SubLink Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.sublink/config.toml`
//! - Local config: `.sublink/config.toml` (inside a tree store)
//! - Programmatic overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → overrides.

mod error;
mod loader;

pub use error::{ConfigError, ConfigLayer};
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};

/// Default base name of shard files (`<tree_name>.<n>.db`).
pub const DEFAULT_TREE_NAME: &str = "tree_extended";

/// Default name of the directory holding the offset tables.
pub const DEFAULT_OFFSETS_DIR: &str = "offsets";

/// Log levels accepted by `logging.level`.
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration for SubLink.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SublinkConfig {
    /// Tree store layout
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Layout of a tree store on disk.
///
/// # Example TOML
///
/// ```toml
/// [store]
/// tree_name = "tree_extended"
/// offsets_dir = "offsets"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Base name of the shard files
    pub tree_name: String,

    /// Directory (relative to the store root) holding the offset tables
    pub offsets_dir: String,

    /// Restrict the engine to a single shard file.
    ///
    /// Only aggregate mode (`None`) is supported by the query engine; any
    /// value here is rejected when the store is opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_num: Option<u32>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tree_name: DEFAULT_TREE_NAME.to_string(),
            offsets_dir: DEFAULT_OFFSETS_DIR.to_string(),
            file_num: None,
        }
    }
}

impl StoreConfig {
    /// Check that names are usable as single path components.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("store.tree_name", &self.tree_name),
            ("store.offsets_dir", &self.offsets_dir),
        ] {
            if value.is_empty() {
                return Err(ConfigError::invalid_value(key, "must not be empty"));
            }
            if value.contains(['/', '\\']) {
                return Err(ConfigError::invalid_value(
                    key,
                    format!("'{}' must be a single path component", value),
                ));
            }
        }
        Ok(())
    }

    /// Whether every shard of the store is addressed (aggregate mode).
    pub fn is_aggregate(&self) -> bool {
        self.file_num.is_none()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Reject levels `tracing` would not understand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_lowercase();
        if VALID_LOG_LEVELS.contains(&level.as_str()) {
            Ok(())
        } else {
            Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ))
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::invalid_value(
                "logging.format",
                format!("unknown format '{}'. Valid values: text, json", s),
            )),
        }
    }
}

/// Programmatic overrides for configuration values.
///
/// Applied over file-based config, e.g. from a host application's own flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override shard base name
    pub tree_name: Option<String>,

    /// Override offsets directory name
    pub offsets_dir: Option<String>,

    /// Request a single shard file
    pub file_num: Option<u32>,

    /// Override log level
    pub log_level: Option<String>,

    /// Override log format
    pub log_format: Option<LogFormat>,
}

impl SublinkConfig {
    /// Apply overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref name) = overrides.tree_name {
            self.store.tree_name = name.clone();
        }

        if let Some(ref dir) = overrides.offsets_dir {
            self.store.offsets_dir = dir.clone();
        }

        if let Some(file_num) = overrides.file_num {
            self.store.file_num = Some(file_num);
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }

        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = SublinkConfig::default();
        assert_eq!(config.store.tree_name, "tree_extended");
        assert_eq!(config.store.offsets_dir, "offsets");
        assert!(config.store.is_aggregate());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = SublinkConfig::default();
        let overrides = ConfigOverrides {
            tree_name: Some("tree_dark".to_string()),
            log_level: Some("debug".to_string()),
            log_format: Some(LogFormat::Json),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.store.tree_name, "tree_dark");
        assert_eq!(config.store.offsets_dir, "offsets");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_file_num_override_leaves_aggregate_mode() {
        let mut config = SublinkConfig::default();
        config.apply_overrides(&ConfigOverrides {
            file_num: Some(3),
            ..Default::default()
        });
        assert_eq!(config.store.file_num, Some(3));
        assert!(!config.store.is_aggregate());
    }

    #[test]
    fn test_store_config_rejects_path_components() {
        let config = StoreConfig {
            tree_name: "trees/extended".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.tree_name"));

        let config = StoreConfig {
            offsets_dir: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.offsets_dir"));
    }

    #[test]
    fn test_logging_level_validation() {
        let mut logging = LoggingConfig::default();
        logging.level = "WARN".to_string();
        assert!(logging.validate().is_ok());

        logging.level = "loud".to_string();
        let err = logging.validate().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = SublinkConfig::default();
        config.store.tree_name = "tree_hydro".to_string();
        config.logging.format = LogFormat::Json;

        let toml_str = toml::to_string(&config).unwrap();
        assert!(!toml_str.contains("file_num"));
        let parsed: SublinkConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, config);
    }
}
