//! Errors raised while reading or writing SubLink configuration files.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which layer of the configuration stack a file belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// `~/.sublink/config.toml`
    Global,
    /// `<store>/.sublink/config.toml`, keyed by the store root
    Store(PathBuf),
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global config"),
            Self::Store(root) => write!(f, "config of store '{}'", root.display()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {layer} at '{}': {source}", path.display())]
    ReadFile {
        layer: ConfigLayer,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{layer} at '{}' is not valid TOML: {source}", path.display())]
    ParseToml {
        layer: ConfigLayer,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode store config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("cannot write store config '{}': {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create config directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No home directory, so no global layer to write to
    #[error("no home directory for the global SubLink config")]
    NoHomeDir,

    /// A setting outside what the engine accepts, e.g. an unknown log level
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn read_file(layer: ConfigLayer, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            layer,
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(layer: ConfigLayer, path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            layer,
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Layer whose file failed to load, if this is a load failure
    pub fn layer(&self) -> Option<&ConfigLayer> {
        match self {
            Self::ReadFile { layer, .. } | Self::ParseToml { layer, .. } => Some(layer),
            _ => None,
        }
    }
}
