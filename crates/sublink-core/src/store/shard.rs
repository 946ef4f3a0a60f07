//! Shard files and the projected row reader
//!
//! A shard holds a contiguous slice of the depth-first ordered node table.
//! [`RowStore`] materializes inclusive local row ranges of it, restricted to
//! a set of columns, and caches one read-only connection per shard.

use super::codec;
use super::sql;
use super::StoreLayout;
use crate::block::{Block, Column, ColumnValues};
use crate::error::{Result, TreeError};
use crate::schema::ColumnSpec;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, trace};

const MAX_PREALLOCATED_ROWS: usize = 1 << 16;

/// Connection to one `<tree_name>.N.db` shard
pub struct ShardConnection {
    conn: Connection,
    shard_id: usize,
}

impl ShardConnection {
    /// Open an existing shard read-only
    pub fn open(path: &Path, shard_id: usize) -> Result<Self> {
        if !path.exists() {
            return Err(TreeError::missing(path));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure_reader(&conn)?;
        Ok(Self { conn, shard_id })
    }

    /// Create a new shard with a node table for `columns`
    pub fn create(path: &Path, shard_id: usize, columns: &[ColumnSpec]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        // Shards are written once and then only read
        conn.pragma_update(None, "synchronous", "OFF")?;
        conn.execute(&sql::create_nodes_table(columns), [])?;
        Ok(Self { conn, shard_id })
    }

    fn configure_reader(conn: &Connection) -> rusqlite::Result<()> {
        conn.pragma_update(None, "query_only", true)?;
        conn.pragma_update(None, "cache_size", -16000)?; // 16MB cache
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "mmap_size", 268435456)?; // 256MB mmap
        Ok(())
    }

    pub fn shard_id(&self) -> usize {
        self.shard_id
    }

    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql::COUNT_NODES, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Append every row of `block` in a transaction, numbering local rows from 0.
    ///
    /// The block must carry each of `columns` with the declared type and dimension.
    pub fn insert_block(&self, block: &Block, columns: &[ColumnSpec]) -> Result<()> {
        let mut sources = Vec::with_capacity(columns.len());
        for spec in columns {
            let column = block
                .column(&spec.name)
                .ok_or_else(|| TreeError::MalformedSchema(format!(
                    "block is missing column '{}'",
                    spec.name
                )))?;
            if column.dtype() != spec.dtype || column.dim() != spec.dim {
                return Err(TreeError::MalformedSchema(format!(
                    "column '{}' is {} x{}, schema declares {} x{}",
                    spec.name,
                    column.dtype(),
                    column.dim(),
                    spec.dtype,
                    spec.dim
                )));
            }
            sources.push(column);
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&sql::insert_node(columns))?;
            for row in 0..block.len() {
                let mut values = Vec::with_capacity(columns.len() + 1);
                values.push(Value::Integer(row as i64));
                for column in &sources {
                    values.push(cell_value(column, row));
                }
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Read the inclusive local row range `[start, end]` restricted to `columns`.
    ///
    /// Fails with `InvalidRowRange` when the range is reversed, negative, or
    /// extends past the end of the shard.
    pub fn read_rows(&self, start: i64, end: i64, columns: &[ColumnSpec]) -> Result<Block> {
        let invalid = |message: String| TreeError::InvalidRowRange {
            shard_id: self.shard_id,
            start,
            end,
            message,
        };
        if start < 0 || end < start {
            return Err(invalid("range is empty or negative".to_string()));
        }
        let expected = usize::try_from(end - start + 1)
            .map_err(|_| invalid("range is too large".to_string()))?;

        // spans derive from on-disk ids, so the reservation is capped
        let reserve = expected.min(MAX_PREALLOCATED_ROWS);
        let mut builders: Vec<ColumnValues> = columns
            .iter()
            .map(|spec| ColumnValues::with_capacity(spec.dtype, reserve * spec.dim))
            .collect();

        let mut stmt = self.conn.prepare_cached(&sql::select_row_range(columns))?;
        let mut rows = stmt.query(params![start, end])?;
        let mut found = 0usize;
        while let Some(row) = rows.next()? {
            for (idx, (spec, out)) in columns.iter().zip(builders.iter_mut()).enumerate() {
                read_cell(row, idx, spec, out)?;
            }
            found += 1;
        }
        if found != expected {
            return Err(invalid(format!(
                "expected {} rows, shard returned {}",
                expected, found
            )));
        }

        let mut named = Vec::with_capacity(columns.len());
        for (spec, values) in columns.iter().zip(builders) {
            named.push((spec.name.clone(), Column::new(spec.dim, values)?));
        }
        Block::from_columns(named)
    }
}

fn cell_value(column: &Column, row: usize) -> Value {
    if column.dim() != 1 {
        return Value::Blob(codec::encode_row(column.values(), column.dim(), row));
    }
    match column.values() {
        ColumnValues::Int32(v) => Value::Integer(i64::from(v[row])),
        ColumnValues::Int64(v) => Value::Integer(v[row]),
        ColumnValues::Float32(v) => Value::Real(f64::from(v[row])),
        ColumnValues::Float64(v) => Value::Real(v[row]),
    }
}

fn read_cell(row: &Row<'_>, idx: usize, spec: &ColumnSpec, out: &mut ColumnValues) -> Result<()> {
    if !spec.is_scalar() {
        let blob: Vec<u8> = row.get(idx)?;
        return codec::decode_row_into(&blob, spec, out);
    }
    match out {
        ColumnValues::Int32(v) => v.push(row.get(idx)?),
        ColumnValues::Int64(v) => v.push(row.get(idx)?),
        ColumnValues::Float32(v) => v.push(row.get::<_, f64>(idx)? as f32),
        ColumnValues::Float64(v) => v.push(row.get(idx)?),
    }
    Ok(())
}

/// Shard handle cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleMetrics {
    /// Reads served by an already open shard
    pub hits: u64,
    /// Reads that had to open the shard first
    pub misses: u64,
}

impl HandleMetrics {
    /// Get hit rate as a fraction (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct HandleState {
    shards: HashMap<usize, ShardConnection>,
    metrics: HandleMetrics,
}

/// Projected row reader over every shard of a store
pub struct RowStore {
    layout: StoreLayout,
    state: Mutex<HandleState>,
}

impl RowStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            state: Mutex::new(HandleState {
                shards: HashMap::new(),
                metrics: HandleMetrics::default(),
            }),
        }
    }

    /// Read `[start, end]` of one shard, opening and caching it on first use.
    pub fn read(
        &self,
        shard_id: usize,
        start: i64,
        end: i64,
        columns: &[ColumnSpec],
    ) -> Result<Block> {
        let mut state = self.state.lock();
        let HandleState { shards, metrics } = &mut *state;
        let shard = match shards.entry(shard_id) {
            std::collections::hash_map::Entry::Occupied(slot) => {
                metrics.hits += 1;
                slot.into_mut()
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                let path = self.layout.shard_path(shard_id);
                debug!(shard_id, path = %path.display(), "Opening shard");
                let conn = ShardConnection::open(&path, shard_id)?;
                metrics.misses += 1;
                slot.insert(conn)
            }
        };
        trace!(shard_id, start, end, columns = columns.len(), "Reading row range");
        shard.read_rows(start, end, columns)
    }

    /// Number of shards currently open
    pub fn open_count(&self) -> usize {
        self.state.lock().shards.len()
    }

    pub fn metrics(&self) -> HandleMetrics {
        self.state.lock().metrics
    }

    /// Close every open shard, returning how many were closed
    pub fn release(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.shards.len();
        state.shards.clear();
        count
    }
}
