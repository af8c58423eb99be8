use std::path::{Path, PathBuf};
use std::time::Instant;
use std::{env, process};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vbench_core::config::{resolve_with_base, Config, RunConfig};
use vbench_core::dataset::{batches, DatasetReader};
use vbench_core::engine::EngineDescriptor;
use vbench_core::types::{ConnectionParams, UploadParams};
use vbench_pgvector::{resolve, PollPolicy, PollSettings, RetryPolicy, RetrySettings};

const USAGE: &str = "usage: vbench-upload <records.jsonl|dir> [--engine NAME] [--container NAME] [--batch-size N] [--limit N] [--skip-index]";

struct Args {
    records: Option<PathBuf>,
    engine: Option<String>,
    container: Option<String>,
    batch_size: Option<usize>,
    limit: Option<usize>,
    skip_index: bool,
}

fn numeric_flag(args: &[String], i: usize, flag: &str) -> usize {
    match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
        Some(n) if n > 0 => n,
        _ => {
            eprintln!("Error: {} requires a positive number\n{}", flag, USAGE);
            process::exit(2);
        }
    }
}

fn text_flag(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i + 1) {
        Some(v) if !v.starts_with('-') => v.clone(),
        _ => {
            eprintln!("Error: {} requires a value\n{}", flag, USAGE);
            process::exit(2);
        }
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut parsed = Args { records: None, engine: None, container: None, batch_size: None, limit: None, skip_index: false };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--skip-index" => parsed.skip_index = true,
            "--engine" => { parsed.engine = Some(text_flag(&args, i, "--engine")); i += 1; }
            "--container" => { parsed.container = Some(text_flag(&args, i, "--container")); i += 1; }
            "--batch-size" => { parsed.batch_size = Some(numeric_flag(&args, i, "--batch-size")); i += 1; }
            "--limit" => { parsed.limit = Some(numeric_flag(&args, i, "--limit")); i += 1; }
            "-h" | "--help" => { println!("{}", USAGE); process::exit(0); }
            a if !a.starts_with('-') => parsed.records = Some(PathBuf::from(a)),
            other => { eprintln!("Error: unknown flag {}\n{}", other, USAGE); process::exit(2); }
        }
        i += 1;
    }
    parsed
}

/// Hostname declared by the engine's container config, if any.
fn engine_hostname(engine_dir: &Path, engine: &str, container: &str) -> Option<String> {
    match EngineDescriptor::from_name(engine_dir, engine) {
        Ok(descriptor) => descriptor.get_config(container).and_then(|c| c.hostname.clone()),
        Err(e) => {
            warn!("Could not read engine config for '{}': {}", engine, e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let run: RunConfig = config.get_or_default("run")?;
    let connection: ConnectionParams = config.get_or_default("connection")?;
    let mut upload: UploadParams = config.get_or_default("upload")?;
    let retry: RetrySettings = config.get_or_default("retry")?;
    let poll: PollSettings = config.get_or_default("poll")?;

    if let Some(n) = args.batch_size { upload.batch_size = n; }
    let skip_index = args.skip_index || run.skip_index;

    let base = env::current_dir()?;
    let records_path = match args.records.or_else(|| run.records.as_ref().map(|r| resolve_with_base(&base, r))) {
        Some(p) => p,
        None => {
            eprintln!("Error: no records given and run.records is not set\n{}", USAGE);
            process::exit(2);
        }
    };

    let host = match args.engine.or(run.engine.clone()) {
        Some(engine) => {
            let container = args.container.unwrap_or_else(|| run.container.clone());
            engine_hostname(&resolve_with_base(&base, &run.engine_dir), &engine, &container)
        }
        None => None,
    }
    .unwrap_or_else(|| "localhost".to_string());

    println!("pgvector Upload\n===============");
    println!("Records: {}", records_path.display());

    let reader = match args.limit { Some(n) => DatasetReader::with_limit(n), None => DatasetReader::new() };
    let records = reader
        .read(&records_path)
        .with_context(|| format!("reading records from {}", records_path.display()))?;
    if records.is_empty() {
        warn!("No records found in {}", records_path.display());
        return Ok(());
    }
    info!(records = records.len(), batch_size = upload.batch_size, "Loaded records");

    let batch_size = upload.batch_size;
    let mut session = resolve(&connection, &host, &run.distance, upload, records.len())
        .await
        .context("resolving upload session")?
        .with_retry_policy(RetryPolicy::from(retry))
        .with_poll_policy(PollPolicy::from(poll));

    let progress = ProgressBar::new(records.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} records")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let upload_started = Instant::now();
    for batch in batches(&records, batch_size) {
        session
            .upload_batch(&batch)
            .await
            .with_context(|| format!("uploading batch starting at id {}", batch.ids.first().copied().unwrap_or_default()))?;
        progress.inc(batch.len() as u64);
    }
    progress.finish();
    let upload_time = upload_started.elapsed();
    println!("📊 Uploaded {} records in {:.2?}", records.len(), upload_time);

    if skip_index {
        println!("⚠️  Skipping index build (--skip-index)");
    } else {
        let index_started = Instant::now();
        session.build_index().await.context("building index")?;
        println!("📊 Index built in {:.2?}", index_started.elapsed());
    }

    println!("\n✅ Upload completed: {} records, distance {} ({})", records.len(), session.distance(), session.distance_operator());
    Ok(())
}
