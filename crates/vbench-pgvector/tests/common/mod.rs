#![allow(dead_code)]

use std::collections::VecDeque;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use vbench_core::error::{Error, Result};
use vbench_core::types::{Batch, Metadata, UploadParams};
use vbench_pgvector::statement::InsertStatement;
use vbench_pgvector::{SessionContext, SqlSession};

/// In-memory session that records every call and replays scripted failures
/// and indexing-status readings.
#[derive(Default)]
pub struct ScriptedSession {
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub inserts: Vec<InsertStatement>,
    pub committed_rows: u64,
    pub executed: Vec<String>,
    pub status_queries: Vec<String>,
    pub insert_failures: VecDeque<Error>,
    pub execute_failures: VecDeque<Error>,
    pub readings: VecDeque<Result<bool>>,
    /// Reading returned once `readings` runs dry.
    pub busy_when_exhausted: bool,
    /// Status queries never return once `readings` runs dry.
    pub stall_when_exhausted: bool,
    pending_rows: u64,
}

impl ScriptedSession {
    pub fn with_readings<I: IntoIterator<Item = bool>>(readings: I) -> Self {
        Self { readings: readings.into_iter().map(Ok).collect(), ..Self::default() }
    }

    pub fn failing_inserts<I: IntoIterator<Item = Error>>(failures: I) -> Self {
        Self { insert_failures: failures.into_iter().collect(), ..Self::default() }
    }
}

#[async_trait]
impl SqlSession for ScriptedSession {
    async fn begin(&mut self) -> Result<()> {
        self.begins += 1;
        self.pending_rows = 0;
        Ok(())
    }

    async fn execute_insert(&mut self, insert: &InsertStatement) -> Result<u64> {
        if let Some(e) = self.insert_failures.pop_front() {
            return Err(e);
        }
        self.inserts.push(insert.clone());
        self.pending_rows += insert.rows as u64;
        Ok(insert.rows as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        self.committed_rows += self.pending_rows;
        self.pending_rows = 0;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.rollbacks += 1;
        self.pending_rows = 0;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        if let Some(e) = self.execute_failures.pop_front() {
            return Err(e);
        }
        self.executed.push(sql.to_string());
        Ok(())
    }

    async fn query_flag(&mut self, sql: &str) -> Result<bool> {
        self.status_queries.push(sql.to_string());
        match self.readings.pop_front() {
            Some(reading) => reading,
            None if self.stall_when_exhausted => std::future::pending().await,
            None => Ok(self.busy_when_exhausted),
        }
    }
}

pub fn meta(pairs: &[(&str, Value)]) -> Metadata {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<IndexMap<_, _>>()
}

pub fn two_record_batch(metadata: Vec<Option<Metadata>>) -> Batch {
    Batch::new(vec![1, 2], vec![vec![0.1, 0.2], vec![0.3, 0.4]], metadata)
}

pub fn session(conn: ScriptedSession) -> SessionContext<ScriptedSession> {
    SessionContext::with_connection(conn, "cosine", UploadParams::default(), 2).expect("session")
}

pub fn session_with(conn: ScriptedSession, params: UploadParams) -> SessionContext<ScriptedSession> {
    SessionContext::with_connection(conn, "cosine", params, 2).expect("session")
}
