mod common;

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::json;
use tokio::time::Instant;

use common::{session, session_with, two_record_batch, ScriptedSession};
use vbench_core::error::Error;
use vbench_core::traits::Uploader;
use vbench_core::types::UploadParams;
use vbench_pgvector::{IndexState, PollPolicy};

fn readings(busy: usize, idle: usize) -> Vec<bool> {
    std::iter::repeat(true).take(busy).chain(std::iter::repeat(false).take(idle)).collect()
}

#[tokio::test(start_paused = true)]
async fn waits_for_ten_consecutive_idle_readings() {
    let mut s = session(ScriptedSession::with_readings(readings(9, 10)));
    assert_eq!(s.index_state(), IndexState::NotRequested);

    let started = Instant::now();
    s.build_index().await.expect("build index");

    assert_eq!(s.connection().status_queries.len(), 19);
    assert!(started.elapsed() >= Duration::from_secs(19));
    assert_eq!(s.index_state(), IndexState::Ready);
    assert_eq!(
        s.connection().executed,
        vec!["CREATE INDEX ON items USING hnsw (vector vector_cosine_ops);".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn isolated_idle_reading_does_not_end_polling() {
    let mut script = vec![true, false, true, true];
    script.extend(std::iter::repeat(false).take(10));
    let mut s = session(ScriptedSession::with_readings(script));

    s.build_index().await.expect("build index");

    assert_eq!(s.connection().status_queries.len(), 14);
}

#[tokio::test(start_paused = true)]
async fn nine_idle_readings_are_not_enough() {
    let mut conn = ScriptedSession::with_readings(readings(0, 9));
    conn.busy_when_exhausted = true;
    let policy = PollPolicy { deadline: Some(Duration::from_secs(30)), ..PollPolicy::default() };
    let mut s = session(conn).with_poll_policy(policy);

    let err = s.build_index().await.unwrap_err();

    assert!(matches!(err, Error::IndexBuildTimeout(d) if d == Duration::from_secs(30)), "got {err:?}");
    assert_eq!(s.connection().status_queries.len(), 30);
    assert!(matches!(s.index_state(), IndexState::Polling { consecutive_idle: 0, .. }));
}

#[tokio::test(start_paused = true)]
async fn threshold_is_configurable() {
    let policy = PollPolicy { required_idle: 3, interval: Duration::from_millis(200), deadline: None };
    let mut s = session(ScriptedSession::with_readings(readings(2, 3))).with_poll_policy(policy);

    s.build_index().await.expect("build index");

    assert_eq!(s.connection().status_queries.len(), 5);
    assert_eq!(s.index_state(), IndexState::Ready);
}

#[tokio::test(start_paused = true)]
async fn create_index_failure_is_fatal_and_skips_polling() {
    let mut conn = ScriptedSession::default();
    conn.execute_failures.push_back(Error::Write("relation \"items\" does not exist".to_string()));
    let mut s = session(conn);

    let err = s.build_index().await.unwrap_err();

    assert!(matches!(err, Error::IndexBuild(_)), "got {err:?}");
    assert!(s.connection().status_queries.is_empty());
    assert_eq!(s.index_state(), IndexState::BuildIssued);
}

#[tokio::test(start_paused = true)]
async fn stalled_status_query_is_cut_off_at_the_deadline() {
    let mut conn = ScriptedSession::with_readings(readings(3, 0));
    conn.stall_when_exhausted = true;
    let policy = PollPolicy { deadline: Some(Duration::from_secs(20)), ..PollPolicy::default() };
    let mut s = session(conn).with_poll_policy(policy);

    let started = Instant::now();
    let err = s.build_index().await.unwrap_err();

    assert!(matches!(err, Error::IndexBuildTimeout(d) if d == Duration::from_secs(20)), "got {err:?}");
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(s.connection().status_queries.len(), 4);
    assert!(matches!(s.index_state(), IndexState::Polling { polls: 4, .. }));
}

#[tokio::test(start_paused = true)]
async fn transient_status_errors_reset_the_idle_run() {
    let mut conn = ScriptedSession::default();
    conn.readings.extend(readings(0, 5).into_iter().map(Ok));
    conn.readings.push_back(Err(Error::TransientWrite("connection reset".to_string())));
    conn.readings.extend(readings(0, 10).into_iter().map(Ok));
    let mut s = session(conn);

    s.build_index().await.expect("build index");

    assert_eq!(s.connection().status_queries.len(), 16);
}

#[tokio::test(start_paused = true)]
async fn permanent_status_errors_abort() {
    let mut conn = ScriptedSession::default();
    conn.readings.push_back(Err(Error::Write("relation \"pg_vector_index_info\" does not exist".to_string())));
    let mut s = session(conn);

    assert!(matches!(s.build_index().await, Err(Error::IndexBuild(_))));
}

#[tokio::test(start_paused = true)]
async fn pgvecto_rs_build_uses_its_status_view_and_options() {
    let mut index_params = IndexMap::new();
    index_params.insert("m".to_string(), json!(16));
    let params = UploadParams { engine_type: "rust".to_string(), index_params, ..UploadParams::default() };
    let mut s = session_with(ScriptedSession::with_readings(readings(1, 10)), params);

    s.build_index().await.expect("build index");

    let conn = s.connection();
    assert!(conn.executed[0].starts_with("CREATE INDEX ON items USING vectors (vector vecf16_cos_ops)"));
    assert!(conn.executed[0].contains("[indexing.hnsw]\nm=16\n$$);"));
    assert!(conn.status_queries.iter().all(|q| q.contains("pg_vector_index_info")));
}

#[tokio::test(start_paused = true)]
async fn uploader_trait_drives_the_whole_load_phase() {
    let mut uploader: Box<dyn Uploader> = Box::new(session(ScriptedSession::with_readings(readings(0, 10))));

    assert_eq!(uploader.engine(), "c");
    uploader.upload_batch(&two_record_batch(vec![None, None])).await.expect("upload");
    uploader.post_upload().await.expect("index");
}
