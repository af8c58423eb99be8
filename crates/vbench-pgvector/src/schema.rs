use std::collections::HashSet;

use serde_json::Value;

use vbench_core::error::{Error, Result};
use vbench_core::types::{Batch, Metadata};

pub const ID_COLUMN: &str = "id";
pub const VECTOR_COLUMN: &str = "vector";

/// Ordered metadata columns of the target table.
///
/// The id and vector columns are implicit and always come first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<String>,
}

impl TableSchema {
    pub fn declared(columns: Vec<String>) -> Result<Self> {
        for c in &columns {
            check_identifier(c)?;
            if c == ID_COLUMN || c == VECTOR_COLUMN {
                return Err(Error::Configuration(format!("metadata column '{}' clashes with a built-in column", c)));
            }
        }
        Ok(Self { columns })
    }

    /// Columns taken from the first record that carries metadata; empty when
    /// no record does.
    pub fn derive(batch: &Batch) -> Result<Self> {
        match batch.metadata.iter().flatten().next() {
            Some(meta) => Self::declared(meta.keys().cloned().collect()),
            None => Ok(Self { columns: Vec::new() }),
        }
    }

    pub fn columns(&self) -> &[String] { &self.columns }

    /// Full insert column list: `id, vector, <metadata columns...>`.
    pub fn column_list(&self) -> Vec<&str> {
        [ID_COLUMN, VECTOR_COLUMN]
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    /// Every record that carries metadata must carry exactly these columns.
    /// Records without metadata insert NULLs.
    pub fn validate(&self, batch: &Batch) -> Result<()> {
        let expected: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        for (id, meta) in batch.ids.iter().zip(&batch.metadata) {
            let Some(meta) = meta else { continue };
            let actual: HashSet<&str> = meta.keys().map(String::as_str).collect();
            if actual != expected {
                let mut missing: Vec<&str> = expected.difference(&actual).copied().collect();
                let mut unexpected: Vec<&str> = actual.difference(&expected).copied().collect();
                missing.sort_unstable();
                unexpected.sort_unstable();
                return Err(Error::SchemaMismatch {
                    id: *id,
                    reason: format!("missing columns {:?}, unexpected columns {:?}", missing, unexpected),
                });
            }
        }
        Ok(())
    }
}

/// Columns are spliced into SQL unquoted, so only plain identifiers pass.
pub fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::UnsupportedFeature(format!("'{}' is not a plain SQL identifier", name)))
    }
}

/// Cast target for vector literals: an identifier, optionally with a
/// dimension, as in `vector` or `halfvec(768)`.
pub fn check_type_name(name: &str) -> Result<()> {
    let (base, dim) = match name.split_once('(') {
        Some((base, rest)) => (base, Some(rest)),
        None => (name, None),
    };
    let dim_ok = dim.map_or(true, |d| {
        d.strip_suffix(')').is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    });
    if dim_ok && check_identifier(base).is_ok() {
        Ok(())
    } else {
        Err(Error::Configuration(format!("vector_type '{}' is not a plain type name", name)))
    }
}

/// Geo points are `{lat, lon}` objects.
fn is_geo(v: &Value) -> bool {
    matches!(v, Value::Object(map) if map.contains_key("lat") && map.contains_key("lon"))
}

/// Rejects values that have no scalar column representation.
pub fn check_values(batch: &Batch) -> Result<()> {
    for meta in batch.metadata.iter().flatten() {
        check_metadata(meta)?;
    }
    Ok(())
}

fn check_metadata(meta: &Metadata) -> Result<()> {
    for (column, value) in meta {
        if is_geo(value) {
            return Err(Error::UnsupportedFeature("geo columns not supported".to_string()));
        }
        if value.is_object() || value.is_array() {
            return Err(Error::UnsupportedFeature(format!("structured value in column '{}'", column)));
        }
    }
    Ok(())
}
