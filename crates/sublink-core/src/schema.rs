//! Schema table and column selection
//!
//! The schema maps every column name to its scalar type and dimension. It is
//! read once from `manifest.json` when a store is opened; no column outside
//! it can be requested or materialized.

use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Version of the `manifest.json` layout
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0";

pub const SUBHALO_ID: &str = "SubhaloID";
pub const DESCENDANT_ID: &str = "DescendantID";
pub const ROOT_DESCENDANT_ID: &str = "RootDescendantID";
pub const MAIN_LEAF_PROGENITOR_ID: &str = "MainLeafProgenitorID";
pub const LAST_PROGENITOR_ID: &str = "LastProgenitorID";
pub const SNAP_NUM: &str = "SnapNum";

/// Columns every store must declare, with their required types
pub const MANDATORY_COLUMNS: [(&str, ScalarType); 6] = [
    (SUBHALO_ID, ScalarType::Int64),
    (DESCENDANT_ID, ScalarType::Int64),
    (ROOT_DESCENDANT_ID, ScalarType::Int64),
    (MAIN_LEAF_PROGENITOR_ID, ScalarType::Int64),
    (LAST_PROGENITOR_ID, ScalarType::Int64),
    (SNAP_NUM, ScalarType::Int32),
];

/// Name reserved for the shard-local row number in shard tables
pub(crate) const ROW_COLUMN: &str = "row";

/// Element type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ScalarType {
    /// Size of one element in a packed vector blob
    pub fn byte_width(self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the schema table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: ScalarType,
    /// Elements per row; 1 for scalars, e.g. 3 for positions
    #[serde(default = "default_dim")]
    pub dim: usize,
}

fn default_dim() -> usize {
    1
}

impl ColumnSpec {
    pub fn scalar(name: impl Into<String>, dtype: ScalarType) -> Self {
        Self {
            name: name.into(),
            dtype,
            dim: 1,
        }
    }

    pub fn vector(name: impl Into<String>, dtype: ScalarType, dim: usize) -> Self {
        Self {
            name: name.into(),
            dtype,
            dim,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.dim == 1
    }
}

/// Which columns a query should materialize
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Columns {
    /// Every column declared in the schema
    #[default]
    All,
    /// Only the named columns
    Select(Vec<String>),
}

impl Columns {
    pub fn select<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Select(names.into_iter().map(Into::into).collect())
    }

    /// Same selection with `required` columns added when missing
    pub fn with_required(&self, required: &[&str]) -> Self {
        match self {
            Self::All => Self::All,
            Self::Select(names) => {
                let mut names = names.clone();
                for name in required {
                    if !names.iter().any(|n| n == name) {
                        names.push((*name).to_string());
                    }
                }
                Self::Select(names)
            }
        }
    }
}

/// Resolved schema table
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema, checking names, dimensions and the mandatory tree columns.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(columns.len());
        for (idx, spec) in columns.iter().enumerate() {
            validate_column_name(&spec.name)?;
            if spec.dim == 0 {
                return Err(TreeError::MalformedSchema(format!(
                    "column '{}' has dimension 0",
                    spec.name
                )));
            }
            if by_name.insert(spec.name.clone(), idx).is_some() {
                return Err(TreeError::MalformedSchema(format!(
                    "column '{}' is declared twice",
                    spec.name
                )));
            }
        }

        let schema = Self { columns, by_name };
        for (name, dtype) in MANDATORY_COLUMNS {
            match schema.get(name) {
                None => {
                    return Err(TreeError::MalformedSchema(format!(
                        "mandatory column '{}' is missing",
                        name
                    )))
                }
                Some(spec) if spec.dtype != dtype || !spec.is_scalar() => {
                    return Err(TreeError::MalformedSchema(format!(
                        "mandatory column '{}' must be a scalar {}, found {} x{}",
                        name, dtype, spec.dtype, spec.dim
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.by_name.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Resolve a selection to column specs, in schema order, without duplicates.
    ///
    /// Fails with `MalformedSchema` on the first name the schema does not declare.
    pub fn resolve(&self, selection: &Columns) -> Result<Vec<ColumnSpec>> {
        match selection {
            Columns::All => Ok(self.columns.clone()),
            Columns::Select(names) if names.is_empty() => Err(TreeError::MalformedSchema(
                "column selection is empty".to_string(),
            )),
            Columns::Select(names) => {
                let mut wanted = vec![false; self.columns.len()];
                for name in names {
                    let idx = self
                        .by_name
                        .get(name.as_str())
                        .ok_or_else(|| TreeError::unknown_column(name))?;
                    wanted[*idx] = true;
                }
                Ok(self
                    .columns
                    .iter()
                    .zip(wanted)
                    .filter(|(_, keep)| *keep)
                    .map(|(spec, _)| spec.clone())
                    .collect())
            }
        }
    }
}

/// Column names end up quoted inside SQL, so keep them to identifier characters.
fn validate_column_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != ROW_COLUMN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TreeError::MalformedSchema(format!(
            "invalid column name '{}'",
            name
        )))
    }
}

/// Contents of `manifest.json` at the store root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub schema_version: String,
    pub columns: Vec<ColumnSpec>,
}

impl StoreManifest {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            columns,
        }
    }

    /// Load manifest from a JSON file
    ///
    /// Unparsable JSON and version mismatches are `MalformedSchema`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TreeError::missing(path));
        }
        let content = std::fs::read_to_string(path)?;
        let manifest: StoreManifest = serde_json::from_str(&content).map_err(|e| {
            TreeError::MalformedSchema(format!("manifest {}: {}", path.display(), e))
        })?;
        if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(TreeError::MalformedSchema(format!(
                "manifest {}: schema version mismatch: expected {}, found {}",
                path.display(),
                MANIFEST_SCHEMA_VERSION,
                manifest.schema_version
            )));
        }
        Ok(manifest)
    }

    /// Save manifest to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn schema(&self) -> Result<Schema> {
        Schema::new(self.columns.clone())
    }
}

/// The mandatory columns, in declaration order; a starting point for store schemas.
pub fn mandatory_column_specs() -> Vec<ColumnSpec> {
    MANDATORY_COLUMNS
        .iter()
        .map(|(name, dtype)| ColumnSpec::scalar(*name, *dtype))
        .collect()
}
