//! SQLite schema definitions for shard and lookup files
//!
//! Shard tables are generated from the schema table: one SQL column per
//! declared column, plus the shard-local `row` as primary key so that a
//! contiguous row range is a single index range scan.

use crate::schema::{ColumnSpec, ScalarType, ROW_COLUMN};

/// Name of the per-shard node table
pub const NODES_TABLE: &str = "nodes";

/// SQL to create a per-snapshot lookup table
///
/// `row_num = -1` marks an entity with no tree at this snapshot.
pub const SCHEMA_CREATE_SUBHALO_OFFSETS: &str = r#"
CREATE TABLE IF NOT EXISTS subhalo_offsets (
    -- Local (per-snapshot) entity index
    local_id INTEGER PRIMARY KEY NOT NULL,

    -- Global row number across all shards, or -1
    row_num INTEGER NOT NULL,

    -- SubhaloID of the entity's tree node
    subhalo_id INTEGER NOT NULL
)
"#;

pub const SELECT_SUBHALO_OFFSET: &str =
    "SELECT row_num, subhalo_id FROM subhalo_offsets WHERE local_id = ?1";

pub const INSERT_SUBHALO_OFFSET: &str =
    "INSERT INTO subhalo_offsets (local_id, row_num, subhalo_id) VALUES (?1, ?2, ?3)";

/// Quote an identifier for SQLite
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(spec: &ColumnSpec) -> &'static str {
    if !spec.is_scalar() {
        return "BLOB";
    }
    match spec.dtype {
        ScalarType::Int32 | ScalarType::Int64 => "INTEGER",
        ScalarType::Float32 | ScalarType::Float64 => "REAL",
    }
}

/// `CREATE TABLE nodes (...)` for a schema
pub fn create_nodes_table(columns: &[ColumnSpec]) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {} INTEGER PRIMARY KEY NOT NULL",
        NODES_TABLE,
        quote_ident(ROW_COLUMN)
    );
    for spec in columns {
        sql.push_str(&format!(
            ",\n    {} {} NOT NULL",
            quote_ident(&spec.name),
            sql_type(spec)
        ));
    }
    sql.push_str("\n)");
    sql
}

/// Insert statement binding `row` followed by every column
pub fn insert_node(columns: &[ColumnSpec]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}, {}) VALUES ({})",
        NODES_TABLE,
        quote_ident(ROW_COLUMN),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Projected read of the inclusive row range `[?1, ?2]`, in row order
pub fn select_row_range(columns: &[ColumnSpec]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let row = quote_ident(ROW_COLUMN);
    format!(
        "SELECT {} FROM {} WHERE {} BETWEEN ?1 AND ?2 ORDER BY {}",
        names.join(", "),
        NODES_TABLE,
        row,
        row
    )
}

pub const COUNT_NODES: &str = "SELECT COUNT(*) FROM nodes";

pub const COUNT_SUBHALO_OFFSETS: &str = "SELECT COUNT(*) FROM subhalo_offsets";

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::scalar("SubhaloID", ScalarType::Int64),
            ColumnSpec::scalar("SubhaloMass", ScalarType::Float32),
            ColumnSpec::vector("SubhaloPos", ScalarType::Float32, 3),
        ]
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("SnapNum"), "\"SnapNum\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_generated_sql_is_valid() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(&create_nodes_table(&columns()), []).unwrap();
        conn.execute(SCHEMA_CREATE_SUBHALO_OFFSETS, []).unwrap();

        conn.execute(
            &insert_node(&columns()),
            rusqlite::params![0i64, 7i64, 1.5f64, vec![0u8; 12]],
        )
        .unwrap();

        let mut stmt = conn.prepare(&select_row_range(&columns()[..2])).unwrap();
        let ids: Vec<i64> = stmt
            .query_map([0i64, 0i64], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(ids, vec![7]);

        let nodes: i64 = conn.query_row(COUNT_NODES, [], |row| row.get(0)).unwrap();
        let entries: i64 = conn
            .query_row(COUNT_SUBHALO_OFFSETS, [], |row| row.get(0))
            .unwrap();
        assert_eq!((nodes, entries), (1, 0));
    }

    #[test]
    fn test_vector_columns_are_blobs() {
        let sql = create_nodes_table(&columns());
        assert!(sql.contains("\"SubhaloPos\" BLOB"));
        assert!(sql.contains("\"SubhaloMass\" REAL"));
        assert!(sql.contains("\"SubhaloID\" INTEGER"));
    }
}
