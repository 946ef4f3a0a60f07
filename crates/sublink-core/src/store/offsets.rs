//! Global offset table
//!
//! `offsets[i]` is the global row number of the first row of shard `i`. A
//! global row belongs to the last shard whose offset does not exceed it.

use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `file_offsets.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardOffsetsFile {
    pub shard_offsets: Vec<i64>,
}

/// Position of a node inside the sharded store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    pub shard_id: usize,
    pub local_row: i64,
}

/// Maps global row numbers to (shard, local row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardIndex {
    offsets: Vec<i64>,
}

impl ShardIndex {
    /// Build from raw offsets, which must be non-empty, non-negative and
    /// non-decreasing.
    pub fn new(offsets: Vec<i64>) -> std::result::Result<Self, String> {
        if offsets.is_empty() {
            return Err("offset table is empty".to_string());
        }
        if let Some(bad) = offsets.iter().find(|&&o| o < 0) {
            return Err(format!("negative shard offset {}", bad));
        }
        if let Some(idx) = offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(format!(
                "offsets decrease between shard {} ({}) and shard {} ({})",
                idx,
                offsets[idx],
                idx + 1,
                offsets[idx + 1]
            ));
        }
        Ok(Self { offsets })
    }

    /// Load and validate `file_offsets.json`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TreeError::missing(path));
        }
        let malformed = |message: String| TreeError::MalformedOffsets {
            path: PathBuf::from(path),
            message,
        };
        let content = std::fs::read_to_string(path)?;
        let file: ShardOffsetsFile =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        Self::new(file.shard_offsets).map_err(malformed)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ShardOffsetsFile {
            shard_offsets: self.offsets.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn shard_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Greatest shard id whose offset is `<= global_row`
    ///
    /// Among equal offsets (empty shards) the last one wins. `None` when the
    /// row lies before the first shard.
    pub fn shard_of(&self, global_row: i64) -> Option<usize> {
        self.offsets
            .partition_point(|&offset| offset <= global_row)
            .checked_sub(1)
    }

    pub fn locate(&self, global_row: i64) -> Option<RowLocation> {
        let shard_id = self.shard_of(global_row)?;
        Some(RowLocation {
            shard_id,
            local_row: global_row - self.offsets[shard_id],
        })
    }
}
