use async_trait::async_trait;

use crate::error::Result;
use crate::types::Batch;

/// One engine client's load phase: batches in, then a single index build.
///
/// Implementations own their connection, so calls on one uploader never
/// overlap. Parallel loading uses one uploader per worker.
#[async_trait]
pub trait Uploader: Send {
    fn engine(&self) -> &str;
    async fn upload_batch(&mut self, batch: &Batch) -> Result<()>;
    async fn post_upload(&mut self) -> Result<()>;
}
