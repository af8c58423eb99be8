//! JSON Lines record loading and batching.
//!
//! A dataset is either a single `.jsonl` file or a directory tree of them;
//! directories are read in sorted path order so runs are reproducible.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Batch, Record};

#[derive(Default)]
pub struct DatasetReader {
    limit: Option<usize>,
}

impl DatasetReader {
    pub fn new() -> Self { Self::default() }

    /// Stop after `limit` records.
    pub fn with_limit(limit: usize) -> Self { Self { limit: Some(limit) } }

    pub fn read(&self, path: &Path) -> Result<Vec<Record>> {
        let files = if path.is_dir() { self.list_jsonl_files(path) } else { vec![path.to_path_buf()] };
        if files.is_empty() {
            info!("No .jsonl files found under {}", path.display());
            return Ok(vec![]);
        }
        let mut records = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("Reading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            self.read_file(file_path, &mut records)?;
            if self.limit_reached(records.len()) { break; }
        }
        info!("Loaded {} records from {} file(s)", records.len(), files.len());
        Ok(records)
    }

    fn read_file(&self, file_path: &Path, out: &mut Vec<Record>) -> Result<()> {
        let content = fs::read_to_string(file_path)
            .map_err(|source| Error::Io { path: file_path.display().to_string(), source })?;
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() { continue; }
            let record: Record = serde_json::from_str(line).map_err(|source| Error::Json {
                location: format!("{}:{}", file_path.display(), line_no + 1),
                source,
            })?;
            out.push(record);
            if self.limit_reached(out.len()) { break; }
        }
        Ok(())
    }

    fn limit_reached(&self, n: usize) -> bool { self.limit.is_some_and(|l| n >= l) }

    fn list_jsonl_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") { files.push(path.to_path_buf()); }
        }
        files.sort();
        files
    }
}

/// Split records into consecutive batches of at most `batch_size`.
pub fn batches(records: &[Record], batch_size: usize) -> impl Iterator<Item = Batch> + '_ {
    records.chunks(batch_size.max(1)).map(Batch::from_records)
}
