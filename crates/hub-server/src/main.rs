//! Smarthub server
//!
//! Reads sensor and hub events as JSON lines from stdin, aggregates per-hub
//! snapshots and dispatches the device actions of fired scenarios.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hub_config::{resolve_config_path, AppConfig};
use hub_server::{actuator_from_config, ingest_stream, Pipeline};
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "smarthub", version, about = "Smart home event pipeline")]
struct Args {
    /// Configuration file (defaults to $SMARTHUB_CONFIG, then smarthub.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config);
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("smarthub: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(config));
    // stdin reads block a runtime thread; do not wait for them
    runtime.shutdown_timeout(Duration::from_secs(1));

    match result {
        Ok(()) => {
            info!("Shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    info!("Starting smarthub {}", env!("CARGO_PKG_VERSION"));

    let actuator = actuator_from_config(&config.actuator)?;
    let pipeline = Pipeline::new(config, actuator);
    pipeline.load_registry().await?;

    let running = pipeline.spawn();

    let producer = pipeline.producer();
    let topics = pipeline.config().topics.clone();
    let shutdown = pipeline.shutdown().clone();
    let ingest = tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        ingest_stream(stdin, &producer, &topics, &shutdown).await
    });

    info!("Smarthub is running");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutting down...");
        }
        _ = pipeline.shutdown().requested() => {
            warn!("A consumer loop stopped, shutting down");
        }
    }

    let stopped = running.stop().await;
    ingest.abort();

    // Save even after a loop failure so accepted definitions survive
    let saved = pipeline.save_registry().await;
    stopped?;
    saved
}
