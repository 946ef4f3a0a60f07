//! Error type shared by every layer of the query engine.
//!
//! Construction-time variants (`MissingPath`, `MalformedOffsets`,
//! `UnsupportedConfiguration`) abort `TreeDb::open`, as does a
//! `MalformedSchema` from the manifest. Everything raised by a query is local
//! to that call and leaves the engine usable.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening or querying a tree store
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Path not found: {}", path.display())]
    MissingPath { path: PathBuf },

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    #[error("Malformed offset table {}: {message}", path.display())]
    MalformedOffsets { path: PathBuf, message: String },

    #[error("Invalid row range [{start}, {end}] in shard {shard_id}: {message}")]
    InvalidRowRange {
        shard_id: usize,
        start: i64,
        end: i64,
        message: String,
    },

    #[error("Descendant chain broken at SubhaloID {subhalo_id}: {message}")]
    BrokenDescendantChain { subhalo_id: i64, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] sublink_config::ConfigError),
}

impl TreeError {
    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::MissingPath { path: path.into() }
    }

    pub(crate) fn unknown_column(name: &str) -> Self {
        Self::MalformedSchema(format!("column '{}' is not declared in the schema", name))
    }

    /// Whether this variant can only come from opening a store.
    ///
    /// Classifies by variant alone. `MalformedSchema` is raised both by a bad
    /// manifest at open and by a bad column selection at query time, so it
    /// reports `false` even when it aborted `TreeDb::open`; any error returned
    /// by `open` means the store cannot be used.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::MissingPath { .. }
                | Self::MalformedOffsets { .. }
                | Self::UnsupportedConfiguration(_)
                | Self::Config(_)
        )
    }
}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;
