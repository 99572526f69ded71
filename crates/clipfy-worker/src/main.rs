//! Batch conversion worker binary.
//!
//! Usage: `clipfy-worker <batch.json>`. Runs one batch, logs progress, turns
//! Ctrl-C into a cancel and prints the report as JSON on stdout.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipfy_queue::{BatchJob, BusEvent};
use clipfy_worker::{metrics, BatchExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Worker error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "clipfy=info".parse::<tracing_subscriber::filter::Directive>() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<bool> {
    let job_path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: clipfy-worker <batch.json>"))?;

    info!("Starting clipfy-worker");

    let config = WorkerConfig::from_env();
    config.validate()?;
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr)?;
        info!("Prometheus exporter listening on {}", addr);
    }

    let json = tokio::fs::read_to_string(&job_path).await?;
    let job = BatchJob::from_json(&json)?;
    let title = job.notification().title.clone();

    let executor = Arc::new(BatchExecutor::from_config(&config));

    let listener = executor.bus().listen(move |event| match event {
        BusEvent::Progress(sample) => {
            info!("{}: {:.1}% (item {})", title, sample.progress, sample.index)
        }
        BusEvent::State(state) => info!(state = state.as_str(), "{:?}", state),
        BusEvent::Reset { generation } => info!(generation, "New batch"),
    });

    let handle = executor.enqueue(job).await?;

    let cancel_executor = executor.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling batch");
            cancel_executor.cancel().await;
        }
    });

    let report = handle.wait().await?;
    signal_task.abort();
    listener.unsubscribe();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.success)
}
