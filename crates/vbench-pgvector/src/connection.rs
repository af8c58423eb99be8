//! Postgres connection handling.
//!
//! [`SqlSession`] is the narrow surface the uploader needs from a database
//! connection. [`PgSession`] implements it on a single `sqlx` connection;
//! tests substitute scripted sessions.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use tracing::{debug, info, warn};

use vbench_core::error::{Error, Result};
use vbench_core::types::ConnectionParams;

use crate::statement::{InsertStatement, SqlParam};

#[async_trait]
pub trait SqlSession: Send {
    async fn begin(&mut self) -> Result<()>;
    /// Runs one insert inside the open transaction; returns rows affected.
    async fn execute_insert(&mut self, insert: &InsertStatement) -> Result<u64>;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
    /// Runs a statement outside of any explicit transaction.
    async fn execute(&mut self, sql: &str) -> Result<()>;
    /// Runs a query returning a single boolean.
    async fn query_flag(&mut self, sql: &str) -> Result<bool>;
}

/// SQLSTATE classes worth retrying: connection exceptions, transaction
/// rollbacks (serialization, deadlock), insufficient resources and operator
/// intervention (admin shutdown, cancel).
const TRANSIENT_SQLSTATE_CLASSES: [&str; 4] = ["08", "40", "53", "57"];

/// Maps a driver error onto the transient/permanent split.
pub fn classify(err: &sqlx::Error) -> Error {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => Error::TransientWrite(err.to_string()),
        sqlx::Error::Database(db) => {
            let transient = db
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATE_CLASSES.iter().any(|class| code.starts_with(class)));
            if transient { Error::TransientWrite(err.to_string()) } else { Error::Write(err.to_string()) }
        }
        _ => Error::Write(err.to_string()),
    }
}

fn connection_lost(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(_) | sqlx::Error::Protocol(_))
}

pub struct PgSession {
    conn: PgConnection,
    options: PgConnectOptions,
    target: String,
    needs_reconnect: bool,
}

impl PgSession {
    pub async fn connect(params: &ConnectionParams, host: &str) -> Result<Self> {
        let host = params.resolve_host(host);
        let target = format!("postgres://{}@{}:{}/{}", params.user, host, params.port, params.database);
        let options = PgConnectOptions::new()
            .host(host)
            .port(params.port)
            .username(&params.user)
            .password(&params.password)
            .database(&params.database);
        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| Error::Connectivity { target: target.clone(), reason: e.to_string() })?;
        info!("Connected to {}", target);
        Ok(Self { conn, options, target, needs_reconnect: false })
    }

    pub fn target(&self) -> &str { &self.target }

    async fn ensure_connected(&mut self) -> Result<()> {
        if !self.needs_reconnect { return Ok(()); }
        warn!("Reconnecting to {}", self.target);
        self.conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| Error::TransientWrite(format!("reconnect to {} failed: {}", self.target, e)))?;
        self.needs_reconnect = false;
        Ok(())
    }

    fn fail(&mut self, err: sqlx::Error) -> Error {
        if connection_lost(&err) { self.needs_reconnect = true; }
        classify(&err)
    }
}

#[async_trait]
impl SqlSession for PgSession {
    async fn begin(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        match (&mut self.conn).execute(sqlx::raw_sql("BEGIN")).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn execute_insert(&mut self, insert: &InsertStatement) -> Result<u64> {
        let mut query = sqlx::query(&insert.sql);
        for p in &insert.params {
            query = match p {
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::Float(v) => query.bind(*v),
                SqlParam::Text(v) => query.bind(v.as_str()),
                SqlParam::Bool(v) => query.bind(*v),
            };
        }
        match query.execute(&mut self.conn).await {
            Ok(done) => {
                debug!("Inserted {} rows", done.rows_affected());
                Ok(done.rows_affected())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        match (&mut self.conn).execute(sqlx::raw_sql("COMMIT")).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.needs_reconnect { return Ok(()); }
        match (&mut self.conn).execute(sqlx::raw_sql("ROLLBACK")).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.ensure_connected().await?;
        match (&mut self.conn).execute(sqlx::raw_sql(sql)).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn query_flag(&mut self, sql: &str) -> Result<bool> {
        self.ensure_connected().await?;
        match sqlx::query_scalar::<_, bool>(sql).fetch_one(&mut self.conn).await {
            Ok(flag) => Ok(flag),
            Err(e) => Err(self.fail(e)),
        }
    }
}
