//! pgvector / pgvecto.rs uploader: batch inserts with retry, then a blocking
//! index build that waits for the engine to finish.

pub mod connection;
pub mod dialect;
pub mod index_build;
pub mod retry;
pub mod schema;
pub mod session;
pub mod statement;
pub mod writer;

pub use connection::{PgSession, SqlSession};
pub use index_build::{IndexBuildRequest, IndexState, PollPolicy, PollSettings};
pub use retry::{RetryPolicy, RetrySettings};
pub use session::{resolve, SessionContext};
