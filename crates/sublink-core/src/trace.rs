//! Merger trace of one entity
//!
//! Combines the main progenitor branch and the descendant path into one
//! branch ordered from the earliest progenitor to the tree's root, and finds
//! where a property peaks along the past branch.

use crate::block::Block;
use crate::error::{Result, TreeError};
use crate::schema::{Columns, SNAP_NUM};
use crate::tree::TreeDb;

/// Largest value of a scalar column along a branch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub value: f64,
    /// Snapshot of the first row holding the value
    pub snapshot: i32,
    /// Row index within the branch
    pub index: usize,
}

/// Past and future branch of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct MergerTrace {
    past: Block,
    future: Block,
}

impl MergerTrace {
    /// Trace an entity; `SnapNum` is always included.
    ///
    /// `Ok(None)` when the entity has no tree at `snapshot`.
    pub fn trace(db: &TreeDb, snapshot: u32, local_id: u64, columns: &Columns) -> Result<Option<Self>> {
        let columns = columns.with_required(&[SNAP_NUM]);
        let Some(past) = db.get_ancestry_chain(snapshot, local_id, &columns)? else {
            return Ok(None);
        };
        let Some(future) = db.get_descendant_path(snapshot, local_id, &columns)? else {
            return Ok(None);
        };
        Ok(Some(Self { past, future }))
    }

    /// Main progenitor branch, the entity first
    pub fn past(&self) -> &Block {
        &self.past
    }

    /// Descendant path, the entity first
    pub fn future(&self) -> &Block {
        &self.future
    }

    /// Earliest progenitor to root, the entity appearing once
    ///
    /// Only columns present in both branches are kept.
    pub fn full_branch(&self) -> Block {
        let after: Vec<usize> = (1..self.future.len()).collect();
        self.past.reversed().concat(&self.future.take(&after))
    }

    /// Maximum of a scalar column over the past branch.
    ///
    /// Ties resolve to the latest snapshot, the lowest row index. `Ok(None)`
    /// when every value is NaN.
    pub fn peak(&self, column: &str) -> Result<Option<Peak>> {
        let values = self
            .past
            .column(column)
            .ok_or_else(|| TreeError::unknown_column(column))?;
        if values.dim() != 1 {
            return Err(TreeError::MalformedSchema(format!(
                "column '{}' is not scalar",
                column
            )));
        }
        let snaps = self
            .past
            .i32s(SNAP_NUM)
            .ok_or_else(|| TreeError::unknown_column(SNAP_NUM))?;

        let mut best: Option<Peak> = None;
        for (index, &snapshot) in snaps.iter().enumerate() {
            let Some(value) = values.value_f64(index) else {
                continue;
            };
            if value.is_nan() {
                continue;
            }
            if best.map_or(true, |b| value > b.value) {
                best = Some(Peak {
                    value,
                    snapshot,
                    index,
                });
            }
        }
        Ok(best)
    }
}

impl TreeDb {
    /// Whole branch from the earliest progenitor to the root; see [`MergerTrace::full_branch`].
    pub fn get_full_branch(
        &self,
        snapshot: u32,
        local_id: u64,
        columns: &Columns,
    ) -> Result<Option<Block>> {
        Ok(MergerTrace::trace(self, snapshot, local_id, columns)?.map(|t| t.full_branch()))
    }
}
