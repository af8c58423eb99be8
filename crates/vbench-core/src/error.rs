use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Could not connect to {target}: {reason}")]
    Connectivity { target: String, reason: String },

    #[error("Malformed batch: {0}")]
    InputShape(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Record {id} does not match the table schema: {reason}")]
    SchemaMismatch { id: i64, reason: String },

    #[error("Transient write failure: {0}")]
    TransientWrite(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("Index still building after {0:?}")]
    IndexBuildTimeout(Duration),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid record at {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Only transient write failures are worth repeating; everything else is
    /// a caller or schema problem that a retry cannot fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientWrite(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
