//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.sublink/config.toml`
//! 2. Local config: `.sublink/config.toml` (in the tree store)
//! 3. Programmatic overrides
//!
//! Later sources override earlier ones.

use crate::error::{ConfigError, ConfigLayer};
use crate::{ConfigOverrides, LogFormat, LoggingConfig, StoreConfig, SublinkConfig};
use crate::{DEFAULT_OFFSETS_DIR, DEFAULT_TREE_NAME};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".sublink";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".sublink";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.sublink`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<SublinkConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.sublink`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a tree store.
    pub fn local_config_path(&self, store_root: &Path) -> PathBuf {
        store_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a tree store with optional overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates.
    pub fn load(
        &mut self,
        store_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<SublinkConfig, ConfigError> {
        let mut config = SublinkConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(store_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<SublinkConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path, ConfigLayer::Global)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a tree store.
    pub fn load_local(&self, store_root: &Path) -> Result<Option<SublinkConfig>, ConfigError> {
        let local_path = self.local_config_path(store_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path, ConfigLayer::Store(store_root.to_path_buf())).map(Some)
    }

    /// Save configuration to the global config file.
    pub fn save_global(&self, config: &SublinkConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        let global_path = global_dir.join(CONFIG_FILE_NAME);
        save_config_file(&global_path, config)
    }

    /// Save configuration to the local config file of a tree store.
    pub fn save_local(&self, store_root: &Path, config: &SublinkConfig) -> Result<(), ConfigError> {
        let local_path = self.local_config_path(store_root);
        save_config_file(&local_path, config)
    }

    /// Initialize local configuration for a tree store.
    ///
    /// Creates `.sublink/config.toml` with default configuration unless one exists.
    pub fn init_local(&self, store_root: &Path) -> Result<PathBuf, ConfigError> {
        let config_path = self.local_config_path(store_root);
        if !config_path.exists() {
            save_config_file(&config_path, &SublinkConfig::default())?;
        }
        Ok(config_path)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn load_config_file(path: &Path, layer: ConfigLayer) -> Result<SublinkConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return Err(ConfigError::read_file(layer, path, e)),
    };

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(layer, path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &SublinkConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// Field-by-field: an overlay value equal to the default keeps the base value,
/// so partial config files only change what they mention.
fn merge_configs(base: SublinkConfig, overlay: SublinkConfig) -> SublinkConfig {
    SublinkConfig {
        store: merge_store(base.store, overlay.store),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_store(base: StoreConfig, overlay: StoreConfig) -> StoreConfig {
    StoreConfig {
        tree_name: if overlay.tree_name != DEFAULT_TREE_NAME {
            overlay.tree_name
        } else {
            base.tree_name
        },
        offsets_dir: if overlay.offsets_dir != DEFAULT_OFFSETS_DIR {
            overlay.offsets_dir
        } else {
            base.offsets_dir
        },
        file_num: overlay.file_num.or(base.file_num),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: if overlay.level != "info" {
            overlay.level
        } else {
            base.level
        },
        format: if overlay.format != LogFormat::default() {
            overlay.format
        } else {
            base.format
        },
    }
}
