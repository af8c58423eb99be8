//! Domain types shared by the uploader, the dataset reader and the CLI.

use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Scalar metadata attached to a record, in column order.
pub type Metadata = IndexMap<String, Value>;

/// One vector plus its optional scalar payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Records grouped for a single insert call.
///
/// The three sequences are parallel; `check_shape` enforces that before any
/// statement is generated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub ids: Vec<i64>,
    pub vectors: Vec<Vec<f32>>,
    pub metadata: Vec<Option<Metadata>>,
}

impl Batch {
    pub fn new(ids: Vec<i64>, vectors: Vec<Vec<f32>>, metadata: Vec<Option<Metadata>>) -> Self {
        Self { ids, vectors, metadata }
    }

    pub fn from_records(records: &[Record]) -> Self {
        let mut batch = Self::default();
        for r in records {
            batch.ids.push(r.id);
            batch.vectors.push(r.vector.clone());
            batch.metadata.push(r.metadata.clone());
        }
        batch
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Parallel sequences must line up and every vector must share the first
    /// vector's dimensionality.
    pub fn check_shape(&self) -> Result<()> {
        if self.ids.len() != self.vectors.len() || self.ids.len() != self.metadata.len() {
            return Err(Error::InputShape(format!(
                "{} ids, {} vectors, {} metadata entries",
                self.ids.len(),
                self.vectors.len(),
                self.metadata.len()
            )));
        }
        if let Some(first) = self.vectors.first() {
            let dim = first.len();
            if dim == 0 {
                return Err(Error::InputShape(format!("record {} has an empty vector", self.ids[0])));
            }
            for (id, v) in self.ids.iter().zip(&self.vectors) {
                if v.len() != dim {
                    return Err(Error::InputShape(format!(
                        "record {} has dimension {}, expected {}",
                        id,
                        v.len(),
                        dim
                    )));
                }
            }
        }
        Ok(())
    }
}

/// SQL extension flavour served by the target Postgres instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineVariant {
    /// pgvector (`engine_type = "c"`).
    #[default]
    Pgvector,
    /// pgvecto.rs (`engine_type = "rust"`).
    PgvectoRs,
}

impl EngineVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineVariant::Pgvector => "c",
            EngineVariant::PgvectoRs => "rust",
        }
    }
}

impl FromStr for EngineVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "pgvector" => Ok(EngineVariant::Pgvector),
            "rust" | "pgvecto.rs" | "pgvecto-rs" => Ok(EngineVariant::PgvectoRs),
            other => Err(Error::Configuration(format!("unknown engine_type '{}'", other))),
        }
    }
}

fn default_engine_type() -> String { EngineVariant::default().as_str().to_string() }
fn default_table() -> String { "items".to_string() }
fn default_batch_size() -> usize { 64 }

/// Upload and index-build options as they appear under `[upload]`.
///
/// Keys this crate does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadParams {
    #[serde(default = "default_engine_type")]
    pub engine_type: String,
    #[serde(default)]
    pub index_params: IndexMap<String, Value>,
    #[serde(default = "default_table")]
    pub table: String,
    /// Overrides the dialect's vector column type in the insert cast.
    #[serde(default)]
    pub vector_type: Option<String>,
    /// Declared metadata columns; derived from the first record when absent.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Default for UploadParams {
    fn default() -> Self {
        Self {
            engine_type: default_engine_type(),
            index_params: IndexMap::new(),
            table: default_table(),
            vector_type: None,
            columns: None,
            batch_size: default_batch_size(),
            extra: IndexMap::new(),
        }
    }
}

impl UploadParams {
    pub fn engine_variant(&self) -> Result<EngineVariant> { self.engine_type.parse() }
}

fn default_database() -> String { "postgres".to_string() }
fn default_port() -> u16 { 5432 }
fn default_user() -> String { "postgres".to_string() }
fn default_password() -> String { "passwd".to_string() }

/// Credentials and endpoint under `[connection]`.
///
/// `host` here wins over the host handed to the resolver, which usually comes
/// from the engine descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            database: default_database(),
            host: None,
            port: default_port(),
            user: default_user(),
            password: default_password(),
        }
    }
}

impl ConnectionParams {
    pub fn resolve_host<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.host.as_deref().unwrap_or(fallback)
    }
}
