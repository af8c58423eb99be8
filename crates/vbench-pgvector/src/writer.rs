//! Batch upload: validate, render inserts, write under the retry policy.
//!
//! A batch is written inside one transaction, so it either commits completely
//! or leaves nothing behind. Validation happens before the first statement is
//! sent; malformed batches never reach the database.

use tokio::time::sleep;
use tracing::{debug, error, warn};

use vbench_core::error::{Error, Result};
use vbench_core::types::Batch;

use crate::connection::SqlSession;
use crate::schema::{check_values, TableSchema};
use crate::session::SessionContext;
use crate::statement::{InsertBuilder, InsertStatement};

impl<C: SqlSession> SessionContext<C> {
    /// Validated insert statements for `batch`, without touching the database.
    pub fn prepare_inserts(&self, batch: &Batch) -> Result<Vec<InsertStatement>> {
        batch.check_shape()?;
        check_values(batch)?;
        let schema = match &self.declared_schema {
            Some(declared) => declared.clone(),
            None => TableSchema::derive(batch)?,
        };
        schema.validate(batch)?;
        Ok(InsertBuilder::new(&self.upload_params.table, self.vector_type()).build(&schema, batch))
    }

    pub async fn upload_batch(&mut self, batch: &Batch) -> Result<()> {
        if batch.is_empty() {
            batch.check_shape()?;
            return Ok(());
        }
        let inserts = self.prepare_inserts(batch)?;

        let mut failures = 0u32;
        loop {
            match self.write_once(&inserts).await {
                Ok(rows) => {
                    debug!(rows, attempts = failures + 1, "Batch committed");
                    return Ok(());
                }
                Err(e) => {
                    if let Err(rollback_err) = self.conn.rollback().await {
                        warn!("Rollback after failed insert also failed: {}", rollback_err);
                    }
                    failures += 1;
                    if !self.retry.should_retry(&e, failures) {
                        error!(attempts = failures, "Batch upload failed: {}", e);
                        return Err(if (self.retry.retry_on)(&e) {
                            Error::RetriesExhausted { attempts: failures, last: Box::new(e) }
                        } else {
                            e
                        });
                    }
                    let delay = self.retry.delay_for(failures);
                    warn!(attempt = failures, "Batch upload failed, retrying in {:?}: {}", delay, e);
                    sleep(delay).await;
                }
            }
        }
    }

    async fn write_once(&mut self, inserts: &[InsertStatement]) -> Result<u64> {
        self.conn.begin().await?;
        let mut rows = 0u64;
        for insert in inserts {
            rows += self.conn.execute_insert(insert).await?;
        }
        self.conn.commit().await?;
        Ok(rows)
    }
}
