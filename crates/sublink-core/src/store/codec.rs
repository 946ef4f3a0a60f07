//! Packed little-endian encoding of vector column rows
//!
//! A row of a `dim > 1` column is stored as one BLOB of `dim * byte_width`
//! bytes.

use crate::block::ColumnValues;
use crate::error::{Result, TreeError};
use crate::schema::ColumnSpec;

fn le_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(chunk);
    bytes
}

/// Encode row `row` of a column with `dim` values per row.
pub fn encode_row(values: &ColumnValues, dim: usize, row: usize) -> Vec<u8> {
    let range = row * dim..(row + 1) * dim;
    match values {
        ColumnValues::Int32(v) => v[range].iter().flat_map(|x| x.to_le_bytes()).collect(),
        ColumnValues::Int64(v) => v[range].iter().flat_map(|x| x.to_le_bytes()).collect(),
        ColumnValues::Float32(v) => v[range].iter().flat_map(|x| x.to_le_bytes()).collect(),
        ColumnValues::Float64(v) => v[range].iter().flat_map(|x| x.to_le_bytes()).collect(),
    }
}

/// Decode one row blob and append its values to `out`.
pub fn decode_row_into(blob: &[u8], spec: &ColumnSpec, out: &mut ColumnValues) -> Result<()> {
    let width = spec.dtype.byte_width();
    if blob.len() != width * spec.dim {
        return Err(TreeError::MalformedSchema(format!(
            "column '{}': blob of {} bytes does not hold {} x {}",
            spec.name,
            blob.len(),
            spec.dim,
            spec.dtype
        )));
    }
    let chunks = blob.chunks_exact(width);
    match out {
        ColumnValues::Int32(v) => v.extend(chunks.map(|c| i32::from_le_bytes(le_array(c)))),
        ColumnValues::Int64(v) => v.extend(chunks.map(|c| i64::from_le_bytes(le_array(c)))),
        ColumnValues::Float32(v) => v.extend(chunks.map(|c| f32::from_le_bytes(le_array(c)))),
        ColumnValues::Float64(v) => v.extend(chunks.map(|c| f64::from_le_bytes(le_array(c)))),
    }
    Ok(())
}
