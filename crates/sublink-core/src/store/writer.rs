//! Store writer
//!
//! Lays out a depth-first ordered node table as shard files, snapshot lookup
//! tables, the global offset table and the schema manifest, in the layout
//! that `TreeDb` reads.
//!
//! # Example
//!
//! ```no_run
//! use sublink_core::schema::mandatory_column_specs;
//! use sublink_core::store::{SnapshotEntry, StoreWriter};
//! use sublink_core::Block;
//! use sublink_config::StoreConfig;
//! use std::path::Path;
//!
//! # fn rows() -> Block { unimplemented!() }
//! let mut writer = StoreWriter::create(
//!     Path::new("/data/tng100"),
//!     &StoreConfig::default(),
//!     mandatory_column_specs(),
//! ).unwrap();
//! writer.append_shard(&rows()).unwrap();
//! writer.write_snapshot(99, &[SnapshotEntry::new(0, 0)]).unwrap();
//! let stats = writer.finish().unwrap();
//! assert_eq!(stats.shard_count, 1);
//! ```
//!
//! Trees must not cross shard boundaries: every node of a tree has to be
//! appended in the same call.

use super::offsets::ShardIndex;
use super::shard::ShardConnection;
use super::snapshot::{SnapshotEntry, SnapshotTable};
use super::StoreLayout;
use crate::block::Block;
use crate::error::{Result, TreeError};
use crate::schema::{ColumnSpec, Schema, StoreManifest};
use std::collections::BTreeSet;
use std::path::Path;
use sublink_config::StoreConfig;
use tracing::{debug, info};

/// Statistics from writing a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    /// Number of shard files written
    pub shard_count: usize,
    /// Total node rows across all shards
    pub total_rows: i64,
    /// Number of snapshot lookup tables written
    pub snapshot_count: usize,
}

/// Writes a new store directory
pub struct StoreWriter {
    layout: StoreLayout,
    schema: Schema,
    shard_offsets: Vec<i64>,
    next_row: i64,
    snapshots: BTreeSet<u32>,
}

impl StoreWriter {
    /// Start a store at `root` with the given schema table.
    ///
    /// Fails if the schema is malformed or the root already holds a manifest.
    pub fn create(root: &Path, config: &StoreConfig, columns: Vec<ColumnSpec>) -> Result<Self> {
        config.validate()?;
        let schema = Schema::new(columns)?;
        let layout = StoreLayout::new(root, config);
        if layout.manifest_path().exists() {
            return Err(TreeError::UnsupportedConfiguration(format!(
                "{} already holds a store",
                root.display()
            )));
        }
        std::fs::create_dir_all(layout.offsets_dir())?;
        debug!(root = %root.display(), columns = schema.len(), "Creating store");
        Ok(Self {
            layout,
            schema,
            shard_offsets: Vec::new(),
            next_row: 0,
            snapshots: BTreeSet::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Global row number the next appended shard will start at
    pub fn next_global_row(&self) -> i64 {
        self.next_row
    }

    /// Write `rows` as the next shard and return its id.
    pub fn append_shard(&mut self, rows: &Block) -> Result<usize> {
        let shard_id = self.shard_offsets.len();
        let path = self.layout.shard_path(shard_id);
        let shard = ShardConnection::create(&path, shard_id, self.schema.columns())?;
        shard.insert_block(rows, self.schema.columns())?;

        debug!(shard_id, rows = rows.len(), first_row = self.next_row, "Wrote shard");
        self.shard_offsets.push(self.next_row);
        self.next_row += rows.len() as i64;
        Ok(shard_id)
    }

    /// Write the lookup table of one snapshot; entry `i` is local id `i`.
    pub fn write_snapshot(&mut self, snapshot: u32, entries: &[SnapshotEntry]) -> Result<()> {
        if self.snapshots.contains(&snapshot) {
            return Err(TreeError::UnsupportedConfiguration(format!(
                "snapshot {} written twice",
                snapshot
            )));
        }
        if let Some(bad) = entries
            .iter()
            .find(|e| e.has_tree() && (e.global_row < 0 || e.global_row >= self.next_row))
        {
            return Err(TreeError::InvalidRowRange {
                shard_id: self.shard_offsets.len().saturating_sub(1),
                start: bad.global_row,
                end: bad.global_row,
                message: format!("snapshot {} points past the written rows", snapshot),
            });
        }
        let table = SnapshotTable::create(&self.layout.snapshot_path(snapshot), snapshot)?;
        table.insert_entries(entries)?;
        self.snapshots.insert(snapshot);
        Ok(())
    }

    /// Write the offset table and manifest.
    pub fn finish(self) -> Result<WriteStats> {
        let index = ShardIndex::new(self.shard_offsets).map_err(|message| {
            TreeError::MalformedOffsets {
                path: self.layout.file_offsets_path(),
                message,
            }
        })?;
        index.save(&self.layout.file_offsets_path())?;
        StoreManifest::new(self.schema.columns().to_vec()).save(&self.layout.manifest_path())?;

        let stats = WriteStats {
            shard_count: index.shard_count(),
            total_rows: self.next_row,
            snapshot_count: self.snapshots.len(),
        };
        info!(
            root = %self.layout.root().display(),
            shards = stats.shard_count,
            rows = stats.total_rows,
            snapshots = stats.snapshot_count,
            "Store written"
        );
        Ok(stats)
    }
}
