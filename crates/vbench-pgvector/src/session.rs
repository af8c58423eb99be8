//! Session resolution: dialect, distance operator and connection, decided once
//! before the load phase starts.

use async_trait::async_trait;
use tracing::info;

use vbench_core::error::{Error, Result};
use vbench_core::traits::Uploader;
use vbench_core::types::{Batch, ConnectionParams, UploadParams};

use crate::connection::{PgSession, SqlSession};
use crate::dialect::{dialect_for, Dialect};
use crate::index_build::{IndexState, PollPolicy};
use crate::retry::RetryPolicy;
use crate::schema::{check_identifier, check_type_name, TableSchema};

pub struct SessionContext<C> {
    pub(crate) conn: C,
    pub(crate) dialect: Box<dyn Dialect>,
    pub(crate) distance: String,
    pub(crate) operator: &'static str,
    pub(crate) upload_params: UploadParams,
    pub(crate) declared_schema: Option<TableSchema>,
    pub(crate) vector_count: usize,
    pub(crate) retry: RetryPolicy,
    pub(crate) poll: PollPolicy,
    pub(crate) index_state: IndexState,
}

/// Picks the dialect and operator class, then opens the connection.
///
/// Configuration errors are reported before any connection attempt.
pub async fn resolve(
    connection_params: &ConnectionParams,
    host: &str,
    distance: &str,
    upload_params: UploadParams,
    vector_count: usize,
) -> Result<SessionContext<PgSession>> {
    let resolved = Resolved::new(distance, &upload_params)?;
    let conn = PgSession::connect(connection_params, host).await?;
    Ok(resolved.into_session(conn, distance, upload_params, vector_count))
}

struct Resolved {
    dialect: Box<dyn Dialect>,
    operator: &'static str,
    declared_schema: Option<TableSchema>,
}

impl Resolved {
    fn new(distance: &str, upload_params: &UploadParams) -> Result<Self> {
        let dialect = dialect_for(upload_params.engine_variant()?);
        let operator = dialect.distance_operator_for(distance).ok_or_else(|| {
            Error::Configuration(format!(
                "distance '{}' is not supported by engine_type '{}'",
                distance,
                dialect.variant().as_str()
            ))
        })?;
        check_identifier(&upload_params.table).map_err(|_| {
            Error::Configuration(format!("table '{}' is not a plain SQL identifier", upload_params.table))
        })?;
        if let Some(vector_type) = &upload_params.vector_type {
            check_type_name(vector_type)?;
        }
        let declared_schema = upload_params.columns.clone().map(TableSchema::declared).transpose()?;
        Ok(Self { dialect, operator, declared_schema })
    }

    fn into_session<C>(self, conn: C, distance: &str, upload_params: UploadParams, vector_count: usize) -> SessionContext<C> {
        info!(
            engine_type = self.dialect.variant().as_str(),
            operator = self.operator,
            table = %upload_params.table,
            "Resolved upload session"
        );
        SessionContext {
            conn,
            dialect: self.dialect,
            distance: distance.to_string(),
            operator: self.operator,
            upload_params,
            declared_schema: self.declared_schema,
            vector_count,
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
            index_state: IndexState::NotRequested,
        }
    }
}

impl<C: SqlSession> SessionContext<C> {
    /// Builds a session around an already open connection.
    pub fn with_connection(conn: C, distance: &str, upload_params: UploadParams, vector_count: usize) -> Result<Self> {
        let resolved = Resolved::new(distance, &upload_params)?;
        Ok(resolved.into_session(conn, distance, upload_params, vector_count))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn dialect(&self) -> &dyn Dialect { self.dialect.as_ref() }

    pub fn distance(&self) -> &str { &self.distance }

    pub fn distance_operator(&self) -> &str { self.operator }

    pub fn upload_params(&self) -> &UploadParams { &self.upload_params }

    pub fn vector_count(&self) -> usize { self.vector_count }

    pub fn index_state(&self) -> IndexState { self.index_state }

    pub fn connection(&self) -> &C { &self.conn }

    pub fn connection_mut(&mut self) -> &mut C { &mut self.conn }

    /// Vector type used in insert casts, honoring a configured override.
    pub fn vector_type(&self) -> &str {
        self.upload_params.vector_type.as_deref().unwrap_or_else(|| self.dialect.vector_type())
    }

    pub fn into_connection(self) -> C { self.conn }
}

#[async_trait]
impl<C: SqlSession> Uploader for SessionContext<C> {
    fn engine(&self) -> &str { self.dialect.variant().as_str() }

    async fn upload_batch(&mut self, batch: &Batch) -> Result<()> {
        SessionContext::upload_batch(self, batch).await
    }

    async fn post_upload(&mut self) -> Result<()> {
        self.build_index().await
    }
}
