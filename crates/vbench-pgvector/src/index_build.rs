//! Index creation and the wait for it to finish.
//!
//! Flow:
//! 1) Render the dialect's `CREATE INDEX` from the configured index options
//! 2) Execute it synchronously and commit
//! 3) Poll the engine's indexing indicator until it has read "idle"
//!    `required_idle` times in a row, or the deadline passes

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use vbench_core::error::{Error, Result};

use crate::connection::SqlSession;
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    NotRequested,
    BuildIssued,
    Polling { polls: usize, consecutive_idle: usize },
    Ready,
}

/// A single idle reading can be a race with the build starting up, so
/// completion needs a run of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub required_idle: usize,
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            required_idle: 10,
            deadline: Some(Duration::from_secs(4 * 3600)),
        }
    }
}

fn default_interval_ms() -> u64 { 1_000 }
fn default_required_idle() -> usize { 10 }
fn default_deadline_secs() -> u64 { 4 * 3600 }

/// `[poll]` section. `deadline_secs = 0` disables the deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_required_idle")]
    pub required_idle: usize,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            required_idle: default_required_idle(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl From<PollSettings> for PollPolicy {
    fn from(s: PollSettings) -> Self {
        Self {
            interval: Duration::from_millis(s.interval_ms),
            required_idle: s.required_idle.max(1),
            deadline: (s.deadline_secs > 0).then(|| Duration::from_secs(s.deadline_secs)),
        }
    }
}

/// What will be sent to the engine for the index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuildRequest {
    pub statement: String,
    pub status_query: &'static str,
}

impl<C: SqlSession> SessionContext<C> {
    pub fn index_build_request(&self) -> IndexBuildRequest {
        IndexBuildRequest {
            statement: self.dialect.build_create_index_statement(
                &self.upload_params.table,
                self.operator,
                &self.upload_params.index_params,
            ),
            status_query: self.dialect.indexing_status_query(),
        }
    }

    /// Creates the index and returns once the engine reports it built.
    pub async fn build_index(&mut self) -> Result<()> {
        let request = self.index_build_request();
        info!(distance = %self.distance, "Creating index: {}", request.statement.trim());
        self.index_state = IndexState::BuildIssued;
        self.conn
            .execute(&request.statement)
            .await
            .map_err(|e| Error::IndexBuild(e.to_string()))?;

        let started = Instant::now();
        let mut polls = 0usize;
        let mut consecutive_idle = 0usize;
        self.index_state = IndexState::Polling { polls, consecutive_idle };
        while consecutive_idle < self.poll.required_idle {
            sleep(self.poll.interval).await;
            polls += 1;
            let reading = match self.poll.deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(started.elapsed());
                    match timeout(remaining, self.conn.query_flag(request.status_query)).await {
                        Ok(reading) => reading,
                        Err(_) => {
                            self.index_state = IndexState::Polling { polls, consecutive_idle };
                            return Err(Error::IndexBuildTimeout(deadline));
                        }
                    }
                }
                None => self.conn.query_flag(request.status_query).await,
            };
            match reading {
                Ok(true) => consecutive_idle = 0,
                Ok(false) => consecutive_idle += 1,
                Err(e) if e.is_retryable() => {
                    warn!("Indexing status query failed, treating as busy: {}", e);
                    consecutive_idle = 0;
                }
                Err(e) => return Err(Error::IndexBuild(e.to_string())),
            }
            self.index_state = IndexState::Polling { polls, consecutive_idle };
            debug!(polls, consecutive_idle, "Polled indexing status");
            if let Some(deadline) = self.poll.deadline {
                if consecutive_idle < self.poll.required_idle && started.elapsed() >= deadline {
                    return Err(Error::IndexBuildTimeout(deadline));
                }
            }
        }
        self.index_state = IndexState::Ready;
        info!(polls, elapsed = ?started.elapsed(), "Index ready");
        Ok(())
    }
}
