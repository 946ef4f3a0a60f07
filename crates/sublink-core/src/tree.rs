//! Query facade
//!
//! `TreeDb` owns the schema, the shard index and the two handle caches of
//! one store. Every query borrows them through a [`BranchExtractor`]; nothing
//! but the caches changes after open.
//!
//! # Example
//!
//! ```no_run
//! use sublink_core::{Columns, TreeDb};
//! use std::path::Path;
//!
//! let db = TreeDb::open(Path::new("/data/tng100")).unwrap();
//! let columns = Columns::select(["SnapNum", "SubhaloMass"]);
//! match db.get_ancestry_chain(99, 0, &columns).unwrap() {
//!     Some(chain) => println!("main branch of {} nodes", chain.len()),
//!     None => println!("no tree"),
//! }
//! db.close();
//! ```

use crate::block::Block;
use crate::branch::{BranchExtractor, NodeLocation};
use crate::error::{Result, TreeError};
use crate::schema::{Columns, Schema, StoreManifest};
use crate::store::{RowStore, ShardIndex, SnapshotIndex, StoreLayout};
use std::path::Path;
use sublink_config::{ConfigLoader, ConfigOverrides, StoreConfig};
use tracing::{debug, info};

/// Handle and cache counters of an open engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeDbStats {
    /// Shards declared by the offset table
    pub shard_count: usize,
    /// Shards with an open handle
    pub open_shards: usize,
    /// Snapshot lookup tables with an open handle
    pub open_snapshot_tables: usize,
    /// Shard reads served by an open handle
    pub shard_hits: u64,
    /// Shard reads that opened the shard
    pub shard_misses: u64,
}

/// Read-only merger-tree query engine over one store
pub struct TreeDb {
    layout: StoreLayout,
    schema: Schema,
    shards: ShardIndex,
    snapshots: SnapshotIndex,
    rows: RowStore,
}

impl TreeDb {
    /// Open a store with the default layout names.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with_config(root, &StoreConfig::default())
    }

    /// Open a store using global, store-local and override configuration.
    pub fn open_with_loader(
        root: &Path,
        loader: &mut ConfigLoader,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<Self> {
        let config = loader.load(root, overrides)?;
        Self::open_with_config(root, &config.store)
    }

    /// Open a store.
    ///
    /// Fails if the store directory, its first shard or its offsets directory
    /// is missing, if a single shard file is requested, if the manifest or
    /// offset table is malformed, or if any declared shard is missing.
    pub fn open_with_config(root: &Path, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let layout = StoreLayout::new(root, config);

        if !root.is_dir() {
            return Err(TreeError::missing(root));
        }
        let first_shard = layout.shard_path(0);
        if !first_shard.exists() {
            return Err(TreeError::missing(first_shard));
        }
        if !layout.offsets_dir().is_dir() {
            return Err(TreeError::missing(layout.offsets_dir()));
        }
        if let Some(file_num) = config.file_num {
            return Err(TreeError::UnsupportedConfiguration(format!(
                "single shard file {} requested; only the aggregate store is supported",
                file_num
            )));
        }

        let schema = StoreManifest::load(&layout.manifest_path())?.schema()?;
        let shards = ShardIndex::load(&layout.file_offsets_path())?;
        for shard_id in 0..shards.shard_count() {
            let path = layout.shard_path(shard_id);
            if !path.exists() {
                return Err(TreeError::missing(path));
            }
        }

        info!(
            root = %root.display(),
            shards = shards.shard_count(),
            columns = schema.len(),
            "Opened tree store"
        );
        Ok(Self {
            snapshots: SnapshotIndex::new(layout.clone()),
            rows: RowStore::new(layout.clone()),
            layout,
            schema,
            shards,
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn shard_index(&self) -> &ShardIndex {
        &self.shards
    }

    fn extractor(&self) -> BranchExtractor<'_> {
        BranchExtractor::new(&self.schema, &self.shards, &self.snapshots, &self.rows)
    }

    /// Resolve an entity to its place in the store without reading any shard.
    pub fn locate(&self, snapshot: u32, local_id: u64) -> Result<Option<NodeLocation>> {
        self.extractor().locate(snapshot, local_id)
    }

    /// Main progenitor branch: the node at index 0, then backward in time.
    ///
    /// `Ok(None)` when the entity has no tree at `snapshot`.
    pub fn get_ancestry_chain(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        self.extractor().ancestry_chain(snapshot, local_id, columns)
    }

    /// All progenitors, the node at index 0.
    pub fn get_full_subtree(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        self.extractor().full_subtree(snapshot, local_id, columns)
    }

    /// Nodes that evolve directly into this one.
    pub fn get_direct_children(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        self.extractor().direct_children(snapshot, local_id, columns)
    }

    /// Forward branch: the node at index 0, its tree's root last.
    pub fn get_descendant_path(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        self.extractor().descendant_path(snapshot, local_id, columns)
    }

    pub fn stats(&self) -> TreeDbStats {
        let metrics = self.rows.metrics();
        TreeDbStats {
            shard_count: self.shards.shard_count(),
            open_shards: self.rows.open_count(),
            open_snapshot_tables: self.snapshots.open_count(),
            shard_hits: metrics.hits,
            shard_misses: metrics.misses,
        }
    }

    fn release_handles(&self) -> (usize, usize) {
        (self.rows.release(), self.snapshots.release())
    }

    /// Release every open handle and return the final counters.
    pub fn close(self) -> TreeDbStats {
        let stats = self.stats();
        let (shards, tables) = self.release_handles();
        debug!(shards, tables, "Closed tree store");
        stats
    }
}

impl Drop for TreeDb {
    fn drop(&mut self) {
        let (shards, tables) = self.release_handles();
        if shards + tables > 0 {
            debug!(shards, tables, "Released tree store handles on drop");
        }
    }
}

impl std::fmt::Debug for TreeDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeDb")
            .field("root", &self.layout.root())
            .field("shards", &self.shards.shard_count())
            .field("columns", &self.schema.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_is_shareable() {
        assert_send_sync::<TreeDb>();
    }

    #[test]
    fn test_open_missing_root() {
        let err = TreeDb::open(Path::new("/nonexistent/sublink/store")).unwrap_err();
        assert!(matches!(err, TreeError::MissingPath { .. }));
        assert!(err.is_construction_error());
    }
}
