//! On-disk tree store
//!
//! ```text
//! <store>/
//! ├── manifest.json             (schema table)
//! ├── <tree_name>.0.db          (shard 0, SQLite table `nodes`)
//! ├── <tree_name>.N.db
//! └── offsets/
//!     ├── file_offsets.json     (global offset table)
//!     └── offsets_NNN.db        (per-snapshot lookup tables)
//! ```
//!
//! Readers open every file read-only and cache the handle for the lifetime
//! of the owning `TreeDb`. Only [`writer::StoreWriter`] creates files.

pub mod codec;
pub mod offsets;
pub mod shard;
pub mod snapshot;
pub mod sql;
pub mod writer;

use std::path::{Path, PathBuf};
use sublink_config::StoreConfig;

pub use offsets::{RowLocation, ShardIndex, ShardOffsetsFile};
pub use shard::{HandleMetrics, RowStore, ShardConnection};
pub use snapshot::{SnapshotEntry, SnapshotIndex, SnapshotTable};
pub use writer::{StoreWriter, WriteStats};

/// File name of the schema manifest at the store root
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the global offset table inside the offsets directory
pub const FILE_OFFSETS_FILE: &str = "file_offsets.json";

/// Path conventions of one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
    tree_name: String,
    offsets_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(root: &Path, config: &StoreConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            tree_name: config.tree_name.clone(),
            offsets_dir: root.join(&config.offsets_dir),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tree_name(&self) -> &str {
        &self.tree_name
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn offsets_dir(&self) -> &Path {
        &self.offsets_dir
    }

    pub fn file_offsets_path(&self) -> PathBuf {
        self.offsets_dir.join(FILE_OFFSETS_FILE)
    }

    /// `<root>/<tree_name>.<shard_id>.db`
    pub fn shard_path(&self, shard_id: usize) -> PathBuf {
        self.root
            .join(format!("{}.{}.db", self.tree_name, shard_id))
    }

    /// `<offsets>/offsets_<snapshot, three digits>.db`
    pub fn snapshot_path(&self, snapshot: u32) -> PathBuf {
        self.offsets_dir
            .join(format!("offsets_{:03}.db", snapshot))
    }
}
