//! Per-snapshot lookup tables
//!
//! Each snapshot has its own SQLite file mapping a local entity index to the
//! entity's global row number and SubhaloID. Tables are opened on first use
//! and kept open until the owning index is released.

use super::sql::{
    COUNT_SUBHALO_OFFSETS, INSERT_SUBHALO_OFFSET, SCHEMA_CREATE_SUBHALO_OFFSETS, SELECT_SUBHALO_OFFSET,
};
use super::StoreLayout;
use crate::error::{Result, TreeError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Global row value marking an entity with no tree at this snapshot
pub const NO_TREE_ROW: i64 = -1;

/// One row of a snapshot lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub global_row: i64,
    pub subhalo_id: i64,
}

impl SnapshotEntry {
    pub fn new(global_row: i64, subhalo_id: i64) -> Self {
        Self {
            global_row,
            subhalo_id,
        }
    }

    /// Entry for an entity that has no tree
    pub fn no_tree() -> Self {
        Self::new(NO_TREE_ROW, NO_TREE_ROW)
    }

    pub fn has_tree(&self) -> bool {
        self.global_row != NO_TREE_ROW
    }
}

/// Connection to one `offsets_NNN.db` file
pub struct SnapshotTable {
    conn: Connection,
    snapshot: u32,
}

impl SnapshotTable {
    /// Open an existing lookup table read-only
    pub fn open(path: &Path, snapshot: u32) -> Result<Self> {
        if !path.exists() {
            return Err(TreeError::missing(path));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "query_only", true)?;
        Ok(Self { conn, snapshot })
    }

    /// Create a new lookup table
    pub fn create(path: &Path, snapshot: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        conn.execute(SCHEMA_CREATE_SUBHALO_OFFSETS, [])?;
        Ok(Self { conn, snapshot })
    }

    pub fn snapshot(&self) -> u32 {
        self.snapshot
    }

    /// Insert entries in a transaction; entry `i` gets local id `i`.
    pub fn insert_entries(&self, entries: &[SnapshotEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_SUBHALO_OFFSET)?;
            for (local_id, entry) in entries.iter().enumerate() {
                stmt.execute(params![local_id as i64, entry.global_row, entry.subhalo_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Raw lookup, including no-tree entries
    pub fn lookup(&self, local_id: i64) -> Result<Option<SnapshotEntry>> {
        let entry = self
            .conn
            .prepare_cached(SELECT_SUBHALO_OFFSET)?
            .query_row(params![local_id], |row| {
                Ok(SnapshotEntry::new(row.get(0)?, row.get(1)?))
            })
            .optional()?;
        Ok(entry)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(COUNT_SUBHALO_OFFSETS, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Lazily opened, cached lookup tables for every snapshot of a store
pub struct SnapshotIndex {
    layout: StoreLayout,
    tables: Mutex<HashMap<u32, SnapshotTable>>,
}

impl SnapshotIndex {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a (snapshot, local id) pair to its tree node.
    ///
    /// `Ok(None)` when the snapshot table has no such entry or the entity
    /// has no tree. A missing snapshot file is an error.
    pub fn resolve(&self, snapshot: u32, local_id: u64) -> Result<Option<SnapshotEntry>> {
        let Ok(local_id) = i64::try_from(local_id) else {
            return Ok(None);
        };

        let mut tables = self.tables.lock();
        let table = match tables.entry(snapshot) {
            std::collections::hash_map::Entry::Occupied(slot) => slot.into_mut(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                let path = self.layout.snapshot_path(snapshot);
                debug!(snapshot, path = %path.display(), "Opening snapshot lookup table");
                slot.insert(SnapshotTable::open(&path, snapshot)?)
            }
        };

        Ok(table.lookup(local_id)?.filter(SnapshotEntry::has_tree))
    }

    /// Number of lookup tables currently open
    pub fn open_count(&self) -> usize {
        self.tables.lock().len()
    }

    /// Close every open table, returning how many were closed
    pub fn release(&self) -> usize {
        let mut tables = self.tables.lock();
        let count = tables.len();
        tables.clear();
        count
    }
}
