//! Branch extraction over the depth-first row order
//!
//! Because `SubhaloID` is assigned depth-first, a node's main progenitor
//! chain and its whole progenitor subtree are contiguous row ranges starting
//! at the node itself. The descendant path is not contiguous; it is walked
//! inside one bounding read that spans from the tree's root to the node.

use crate::block::Block;
use crate::error::{Result, TreeError};
use crate::schema::{
    ColumnSpec, Columns, Schema, DESCENDANT_ID, LAST_PROGENITOR_ID, MAIN_LEAF_PROGENITOR_ID,
    ROOT_DESCENDANT_ID, SUBHALO_ID,
};
use crate::store::{RowStore, ShardIndex, SnapshotIndex};
use std::collections::HashMap;
use tracing::{trace, warn};

/// Where a resolved node lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLocation {
    pub subhalo_id: i64,
    pub global_row: i64,
    pub shard_id: usize,
    pub local_row: i64,
}

/// Inclusive local row range within one shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub shard_id: usize,
    pub start: i64,
    pub end: i64,
}

impl RowSpan {
    /// Range from the node forward to the row holding `bound_id`
    /// (its main leaf progenitor or last progenitor).
    pub fn forward(shard_id: usize, local_row: i64, subhalo_id: i64, bound_id: i64) -> Result<Self> {
        let span = bound_id - subhalo_id;
        if span < 0 {
            return Err(TreeError::InvalidRowRange {
                shard_id,
                start: local_row,
                end: local_row + span,
                message: format!("bound {} precedes SubhaloID {}", bound_id, subhalo_id),
            });
        }
        Ok(Self {
            shard_id,
            start: local_row,
            end: local_row + span,
        })
    }

    /// Range from the tree's root back down to the node, which is the last row.
    pub fn back_to_root(
        shard_id: usize,
        local_row: i64,
        subhalo_id: i64,
        root_descendant_id: i64,
    ) -> Result<Self> {
        let start = local_row - (subhalo_id - root_descendant_id);
        if start < 0 || start > local_row {
            return Err(TreeError::InvalidRowRange {
                shard_id,
                start,
                end: local_row,
                message: format!(
                    "root {} of SubhaloID {} lies outside the shard",
                    root_descendant_id, subhalo_id
                ),
            });
        }
        Ok(Self {
            shard_id,
            start,
            end: local_row,
        })
    }

    /// Number of rows covered, never zero
    pub fn row_count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }
}

/// Offsets of the descendant path inside `block`, starting at `anchor`.
///
/// Follows `DescendantID` links while they stay at or above the anchor's
/// `RootDescendantID`. The block may be in any order; lookups go through a
/// map from `SubhaloID` to offset built once per call.
pub fn descendant_walk(block: &Block, anchor: usize) -> Result<Vec<usize>> {
    let ids = id_column(block, SUBHALO_ID)?;
    let descendants = id_column(block, DESCENDANT_ID)?;
    let roots = id_column(block, ROOT_DESCENDANT_ID)?;

    if anchor >= ids.len() {
        return Err(TreeError::BrokenDescendantChain {
            subhalo_id: -1,
            message: format!("start offset {} outside block of {} rows", anchor, ids.len()),
        });
    }

    let mut by_id = HashMap::with_capacity(ids.len());
    for (offset, &id) in ids.iter().enumerate() {
        by_id.entry(id).or_insert(offset);
    }

    let root = roots[anchor];
    let mut path = vec![anchor];
    let mut current = anchor;
    while descendants[current] >= root {
        if path.len() >= ids.len() {
            return Err(TreeError::BrokenDescendantChain {
                subhalo_id: ids[current],
                message: format!("walk did not reach root {} within {} rows", root, ids.len()),
            });
        }
        let next = *by_id.get(&descendants[current]).ok_or_else(|| {
            TreeError::BrokenDescendantChain {
                subhalo_id: ids[current],
                message: format!("descendant {} is not in the bounding block", descendants[current]),
            }
        })?;
        path.push(next);
        current = next;
    }
    Ok(path)
}

fn id_column<'b>(block: &'b Block, name: &str) -> Result<&'b [i64]> {
    block
        .i64s(name)
        .ok_or_else(|| TreeError::MalformedSchema(format!("walk needs an int64 '{}' column", name)))
}

/// The four traversals, borrowing the engine's index and caches
pub struct BranchExtractor<'a> {
    schema: &'a Schema,
    shards: &'a ShardIndex,
    snapshots: &'a SnapshotIndex,
    rows: &'a RowStore,
}

impl<'a> BranchExtractor<'a> {
    pub fn new(
        schema: &'a Schema,
        shards: &'a ShardIndex,
        snapshots: &'a SnapshotIndex,
        rows: &'a RowStore,
    ) -> Self {
        Self {
            schema,
            shards,
            snapshots,
            rows,
        }
    }

    /// Resolve an entity to its shard position, touching no shard.
    ///
    /// `Ok(None)` when the entity has no tree at this snapshot.
    pub fn locate(&self, snapshot: u32, local_id: u64) -> Result<Option<NodeLocation>> {
        let Some(entry) = self.snapshots.resolve(snapshot, local_id)? else {
            warn!(
                snapshot,
                local_id, "Subhalo not found; it probably has no tracked content at this snapshot"
            );
            return Ok(None);
        };
        let location = self.shards.locate(entry.global_row).ok_or_else(|| {
            TreeError::InvalidRowRange {
                shard_id: 0,
                start: entry.global_row,
                end: entry.global_row,
                message: "global row precedes the first shard".to_string(),
            }
        })?;
        Ok(Some(NodeLocation {
            subhalo_id: entry.subhalo_id,
            global_row: entry.global_row,
            shard_id: location.shard_id,
            local_row: location.local_row,
        }))
    }

    /// One mandatory id column of the node itself
    fn own_id(&self, node: &NodeLocation, column: &str) -> Result<i64> {
        let spec = self
            .schema
            .get(column)
            .ok_or_else(|| TreeError::unknown_column(column))?;
        let block = self.rows.read(
            node.shard_id,
            node.local_row,
            node.local_row,
            std::slice::from_ref(spec),
        )?;
        block
            .i64s(column)
            .and_then(|values| values.first().copied())
            .ok_or_else(|| TreeError::MalformedSchema(format!("column '{}' is not int64", column)))
    }

    fn read_span(&self, span: RowSpan, columns: &[ColumnSpec]) -> Result<Block> {
        trace!(shard_id = span.shard_id, start = span.start, end = span.end, "Branch read");
        self.rows.read(span.shard_id, span.start, span.end, columns)
    }

    fn forward_range(
        &self,
        snapshot: u32,
        local_id: u64,
        bound_column: &str,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        let specs = self.schema.resolve(columns)?;
        let Some(node) = self.locate(snapshot, local_id)? else {
            return Ok(None);
        };
        let bound = self.own_id(&node, bound_column)?;
        let span = RowSpan::forward(node.shard_id, node.local_row, node.subhalo_id, bound)?;
        self.read_span(span, &specs).map(Some)
    }

    /// Main progenitor chain, the node first, then backward in time
    pub fn ancestry_chain(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        self.forward_range(snapshot, local_id, MAIN_LEAF_PROGENITOR_ID, columns)
    }

    /// Every progenitor, the node first, in depth-first order
    pub fn full_subtree(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        self.forward_range(snapshot, local_id, LAST_PROGENITOR_ID, columns)
    }

    /// Subtree rows whose `DescendantID` is the node's `SubhaloID`
    ///
    /// `SubhaloID` and `DescendantID` are always part of the result.
    pub fn direct_children(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        let columns = columns.with_required(&[SUBHALO_ID, DESCENDANT_ID]);
        let Some(subtree) = self.full_subtree(snapshot, local_id, &columns)? else {
            return Ok(None);
        };
        let (Some(ids), Some(descendants)) = (subtree.i64s(SUBHALO_ID), subtree.i64s(DESCENDANT_ID))
        else {
            return Err(TreeError::MalformedSchema(
                "subtree read lacks id columns".to_string(),
            ));
        };
        let Some(&node_id) = ids.first() else {
            return Ok(Some(subtree));
        };
        let mask: Vec<bool> = descendants.iter().map(|&d| d == node_id).collect();
        Ok(Some(subtree.filter(&mask)))
    }

    /// Forward chain from the node to its tree's root, the node first
    ///
    /// `SubhaloID`, `DescendantID` and `RootDescendantID` are always part of
    /// the result.
    pub fn descendant_path(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        let columns = columns.with_required(&[SUBHALO_ID, DESCENDANT_ID, ROOT_DESCENDANT_ID]);
        let specs = self.schema.resolve(&columns)?;
        let Some(node) = self.locate(snapshot, local_id)? else {
            return Ok(None);
        };
        let root = self.own_id(&node, ROOT_DESCENDANT_ID)?;
        let span = RowSpan::back_to_root(node.shard_id, node.local_row, node.subhalo_id, root)?;
        let block = self.read_span(span, &specs)?;
        let path = descendant_walk(&block, block.len() - 1)?;
        Ok(Some(block.take(&path)))
    }
}
