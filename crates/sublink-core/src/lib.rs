//! SubLink Core - Branch queries over sharded merger-tree stores
//!
//! This crate provides read-only access to merger trees stored in depth-first
//! `SubhaloID` order:
//! - Schema table and typed columnar blocks
//! - Shard offset index and per-snapshot lookup tables
//! - Projected, cached row reads from SQLite shards
//! - Ancestry chain, full subtree, direct children and descendant path queries
//! - Merger traces combining past and future branches
//! - A store writer producing the on-disk layout

pub mod block;
pub mod branch;
pub mod error;
pub mod logging;
pub mod schema;
pub mod store;
pub mod trace;
pub mod tree;

// Re-exports for convenience
pub use block::{Block, Column, ColumnValues};
pub use branch::{descendant_walk, BranchExtractor, NodeLocation, RowSpan};
pub use error::{Result, TreeError};
pub use schema::{
    ColumnSpec, Columns, ScalarType, Schema, StoreManifest, DESCENDANT_ID, LAST_PROGENITOR_ID,
    MAIN_LEAF_PROGENITOR_ID, ROOT_DESCENDANT_ID, SNAP_NUM, SUBHALO_ID,
};
pub use store::{SnapshotEntry, StoreLayout, StoreWriter, WriteStats};
pub use trace::{MergerTrace, Peak};
pub use tree::{TreeDb, TreeDbStats};

pub use sublink_config::{ConfigLoader, ConfigOverrides, LogFormat, LoggingConfig, StoreConfig, SublinkConfig};
