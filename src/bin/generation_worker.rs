//! Runs queued photoshoot generation tasks against `PostgreSQL`, the image
//! generation API and object storage.
//!
//! Usage:
//!
//! ```text
//! generation_worker
//! ```
//!
//! Configuration is read from the environment (and `.env` when present); see
//! [`photoshoot::config`]. On start-up the worker back-fills canonical task
//! links on legacy result records and re-queues stalled batches, then drains
//! the generation queue until interrupted with Ctrl-C.

use photoshoot::config::{ConfigError, GenerationConfig};
use photoshoot::deployment::{DeploymentError, PostgresDeployment};
use photoshoot::telemetry::{DEFAULT_LOG_FILTER, TelemetryError, init_tracing};
use thiserror::Error;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can stop the worker during start-up.
#[derive(Debug, Error)]
enum WorkerError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> Result<(), BoxError> {
    run().map_err(Into::into)
}

fn run() -> Result<(), WorkerError> {
    init_tracing(DEFAULT_LOG_FILTER)?;
    let config = GenerationConfig::from_env()?;
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: GenerationConfig) -> Result<(), WorkerError> {
    let deployment = PostgresDeployment::connect(config)?;

    match deployment.reconciler().backfill_legacy_links().await {
        Ok(count) => info!(count, "legacy result records linked"),
        Err(err) => warn!(error = %err, "legacy link backfill failed"),
    }

    let worker = deployment.worker();
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        info!("shutdown requested");
        signal_token.cancel();
    });

    worker.run(shutdown).await;
    Ok(())
}
