//! Live run against a pgvector server. Needs `VBENCH_PG_HOST` and is ignored
//! by default: `cargo test -p vbench-pgvector -- --ignored`.

use std::time::Duration;

use serde_json::json;
use vbench_core::dataset::batches;
use vbench_core::types::{ConnectionParams, Record, UploadParams};
use vbench_pgvector::{resolve, IndexState, PollPolicy, SqlSession};

fn records(n: i64) -> Vec<Record> {
    (0..n)
        .map(|i| Record {
            id: i,
            vector: vec![i as f32, 1.0 - i as f32 / n as f32],
            metadata: Some([("category".to_string(), json!(if i % 2 == 0 { "even" } else { "odd" }))].into_iter().collect()),
        })
        .collect()
}

#[tokio::test]
#[ignore]
async fn pgvector_full_flow() {
    let host = std::env::var("VBENCH_PG_HOST").unwrap_or_else(|_| "localhost".to_string());
    let params = ConnectionParams::default();
    let upload = UploadParams { table: "vbench_flow".to_string(), batch_size: 16, ..UploadParams::default() };
    let data = records(100);

    let mut session = resolve(&params, &host, "cosine", upload, data.len())
        .await
        .expect("connect")
        .with_poll_policy(PollPolicy { interval: Duration::from_millis(100), required_idle: 3, deadline: Some(Duration::from_secs(120)) });
    let setup = [
        "CREATE EXTENSION IF NOT EXISTS vector",
        "DROP TABLE IF EXISTS vbench_flow",
        "CREATE TABLE vbench_flow (id bigint PRIMARY KEY, vector vector(2), category text)",
    ];
    for sql in setup {
        session.connection_mut().execute(sql).await.expect(sql);
    }

    for batch in batches(&data, 16) {
        session.upload_batch(&batch).await.expect("upload");
    }
    session.build_index().await.expect("index");
    assert_eq!(session.index_state(), IndexState::Ready);

    let count = session.connection_mut().query_flag("SELECT count(*) = 100 FROM vbench_flow").await.expect("count");
    assert!(count);
    session.connection_mut().execute("DROP TABLE vbench_flow").await.expect("cleanup");
}
