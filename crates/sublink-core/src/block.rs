//! Typed columnar blocks
//!
//! A `Block` is what every branch query returns: a map from column name to a
//! fixed-length typed column, all columns holding the same number of rows.
//! Vector columns (e.g. positions) are stored row-major, `dim` values per row.

use crate::error::{Result, TreeError};
use crate::schema::ScalarType;
use std::collections::BTreeMap;

/// Flat storage for one column, `rows * dim` values long
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl ColumnValues {
    pub fn with_capacity(dtype: ScalarType, capacity: usize) -> Self {
        match dtype {
            ScalarType::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            ScalarType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            ScalarType::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            ScalarType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
        }
    }

    pub fn dtype(&self) -> ScalarType {
        match self {
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn gather(&self, dim: usize, rows: impl Iterator<Item = usize>) -> Self {
        fn pick<T: Copy>(src: &[T], dim: usize, rows: impl Iterator<Item = usize>) -> Vec<T> {
            rows.flat_map(|r| src[r * dim..(r + 1) * dim].iter().copied())
                .collect()
        }
        match self {
            Self::Int32(v) => Self::Int32(pick(v, dim, rows)),
            Self::Int64(v) => Self::Int64(pick(v, dim, rows)),
            Self::Float32(v) => Self::Float32(pick(v, dim, rows)),
            Self::Float64(v) => Self::Float64(pick(v, dim, rows)),
        }
    }

    fn append(&mut self, other: &Self) {
        match (self, other) {
            (Self::Int32(a), Self::Int32(b)) => a.extend_from_slice(b),
            (Self::Int64(a), Self::Int64(b)) => a.extend_from_slice(b),
            (Self::Float32(a), Self::Float32(b)) => a.extend_from_slice(b),
            (Self::Float64(a), Self::Float64(b)) => a.extend_from_slice(b),
            _ => unreachable!("append is only called on columns of equal dtype"),
        }
    }

    fn value_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Int32(v) => v.get(idx).map(|&x| f64::from(x)),
            Self::Int64(v) => v.get(idx).map(|&x| x as f64),
            Self::Float32(v) => v.get(idx).map(|&x| f64::from(x)),
            Self::Float64(v) => v.get(idx).copied(),
        }
    }
}

/// One typed column of a block
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    dim: usize,
    values: ColumnValues,
}

impl Column {
    /// Build a column of `values.len() / dim` rows.
    pub fn new(dim: usize, values: ColumnValues) -> Result<Self> {
        if dim == 0 || values.len() % dim != 0 {
            return Err(TreeError::MalformedSchema(format!(
                "{} values do not form rows of dimension {}",
                values.len(),
                dim
            )));
        }
        Ok(Self { dim, values })
    }

    pub fn int32(values: Vec<i32>) -> Self {
        Self {
            dim: 1,
            values: ColumnValues::Int32(values),
        }
    }

    pub fn int64(values: Vec<i64>) -> Self {
        Self {
            dim: 1,
            values: ColumnValues::Int64(values),
        }
    }

    pub fn float32(values: Vec<f32>) -> Self {
        Self {
            dim: 1,
            values: ColumnValues::Float32(values),
        }
    }

    pub fn float64(values: Vec<f64>) -> Self {
        Self {
            dim: 1,
            values: ColumnValues::Float64(values),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn dtype(&self) -> ScalarType {
        self.values.dtype()
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn rows(&self) -> usize {
        self.values.len() / self.dim
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.values {
            ColumnValues::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.values {
            ColumnValues::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.values {
            ColumnValues::Float32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.values {
            ColumnValues::Float64(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a scalar column widened to `f64`; `None` for vector columns or out of range.
    pub fn value_f64(&self, row: usize) -> Option<f64> {
        if self.dim != 1 {
            return None;
        }
        self.values.value_f64(row)
    }

    fn gather(&self, rows: impl Iterator<Item = usize>) -> Self {
        Self {
            dim: self.dim,
            values: self.values.gather(self.dim, rows),
        }
    }
}

/// Equal-length typed columns keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    rows: usize,
    columns: BTreeMap<String, Column>,
}

impl Block {
    /// Assemble a block, checking that all columns have the same row count.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut rows = None;
        let mut map = BTreeMap::new();
        for (name, column) in columns {
            let name = name.into();
            match rows {
                None => rows = Some(column.rows()),
                Some(n) if n != column.rows() => {
                    return Err(TreeError::MalformedSchema(format!(
                        "column '{}' has {} rows, expected {}",
                        name,
                        column.rows(),
                        n
                    )))
                }
                Some(_) => {}
            }
            if map.insert(name.clone(), column).is_some() {
                return Err(TreeError::MalformedSchema(format!(
                    "column '{}' given twice",
                    name
                )));
            }
        }
        Ok(Self {
            rows: rows.unwrap_or(0),
            columns: map,
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn i32s(&self, name: &str) -> Option<&[i32]> {
        self.column(name)?.as_i32()
    }

    pub fn i64s(&self, name: &str) -> Option<&[i64]> {
        self.column(name)?.as_i64()
    }

    pub fn f32s(&self, name: &str) -> Option<&[f32]> {
        self.column(name)?.as_f32()
    }

    pub fn f64s(&self, name: &str) -> Option<&[f64]> {
        self.column(name)?.as_f64()
    }

    /// Copy the given rows, in the given order, across every column.
    ///
    /// # Panics
    /// If an index is out of range.
    pub fn take(&self, indices: &[usize]) -> Block {
        Block {
            rows: indices.len(),
            columns: self
                .columns
                .iter()
                .map(|(name, col)| (name.clone(), col.gather(indices.iter().copied())))
                .collect(),
        }
    }

    /// Keep the rows whose mask entry is `true`.
    ///
    /// # Panics
    /// If the mask length differs from the row count.
    pub fn filter(&self, mask: &[bool]) -> Block {
        assert_eq!(mask.len(), self.rows, "mask length must match row count");
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take(&indices)
    }

    /// Rows in reverse order
    pub fn reversed(&self) -> Block {
        let indices: Vec<usize> = (0..self.rows).rev().collect();
        self.take(&indices)
    }

    /// Rows of `self` followed by rows of `other`, over the columns both share
    /// with identical type and dimension.
    pub fn concat(&self, other: &Block) -> Block {
        let mut columns = BTreeMap::new();
        for (name, left) in &self.columns {
            let Some(right) = other.columns.get(name) else {
                continue;
            };
            if left.dim != right.dim || left.dtype() != right.dtype() {
                continue;
            }
            let mut values = left.values.clone();
            values.append(&right.values);
            columns.insert(
                name.clone(),
                Column {
                    dim: left.dim,
                    values,
                },
            );
        }
        Block {
            rows: self.rows + other.rows,
            columns,
        }
    }

    pub fn into_columns(self) -> BTreeMap<String, Column> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Block {
        Block::from_columns([
            ("SubhaloID", Column::int64(vec![10, 11, 12, 13])),
            ("SnapNum", Column::int32(vec![99, 98, 97, 96])),
            (
                "SubhaloPos",
                Column::new(
                    3,
                    ColumnValues::Float32(vec![
                        0.0, 0.1, 0.2, 1.0, 1.1, 1.2, 2.0, 2.1, 2.2, 3.0, 3.1, 3.2,
                    ]),
                )
                .unwrap(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let err = Block::from_columns([
            ("SubhaloID", Column::int64(vec![1, 2])),
            ("SnapNum", Column::int32(vec![1])),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SnapNum"));
    }

    #[test]
    fn test_column_new_checks_dimension() {
        assert!(Column::new(3, ColumnValues::Float64(vec![1.0, 2.0])).is_err());
        assert!(Column::new(0, ColumnValues::Int32(vec![])).is_err());
        assert_eq!(
            Column::new(2, ColumnValues::Int32(vec![1, 2, 3, 4]))
                .unwrap()
                .rows(),
            2
        );
    }

    #[test]
    fn test_take_gathers_vector_rows() {
        let block = sample();
        let subset = block.take(&[3, 1]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.i64s("SubhaloID").unwrap(), &[13, 11]);
        assert_eq!(subset.i32s("SnapNum").unwrap(), &[96, 98]);
        assert_eq!(
            subset.f32s("SubhaloPos").unwrap(),
            &[3.0, 3.1, 3.2, 1.0, 1.1, 1.2]
        );
    }

    #[test]
    fn test_filter_and_empty_result() {
        let block = sample();
        let kept = block.filter(&[true, false, false, true]);
        assert_eq!(kept.i64s("SubhaloID").unwrap(), &[10, 13]);

        let none = block.filter(&[false; 4]);
        assert!(none.is_empty());
        assert_eq!(none.width(), 3);
    }

    #[test]
    fn test_reversed() {
        let block = sample().reversed();
        assert_eq!(block.i64s("SubhaloID").unwrap(), &[13, 12, 11, 10]);
        assert_eq!(&block.f32s("SubhaloPos").unwrap()[..3], &[3.0, 3.1, 3.2]);
    }

    #[test]
    fn test_concat_keeps_common_columns() {
        let left = sample();
        let right = Block::from_columns([
            ("SubhaloID", Column::int64(vec![20])),
            ("SnapNum", Column::float64(vec![1.0])),
        ])
        .unwrap();
        let joined = left.concat(&right);
        assert_eq!(joined.len(), 5);
        assert_eq!(joined.column_names().collect::<Vec<_>>(), vec!["SubhaloID"]);
        assert_eq!(joined.i64s("SubhaloID").unwrap(), &[10, 11, 12, 13, 20]);
    }

    #[test]
    fn test_value_f64_scalar_only() {
        let block = sample();
        assert_eq!(block.column("SnapNum").unwrap().value_f64(2), Some(97.0));
        assert_eq!(block.column("SubhaloPos").unwrap().value_f64(0), None);
        assert_eq!(block.column("SnapNum").unwrap().value_f64(9), None);
    }
}
