//! AWS Lambda entry point for Course Watch
//!
//! Deploy with `cargo lambda build --release --features lambda` and trigger it
//! from an EventBridge schedule. Each invocation performs one monitor run.
//!
//! ## Environment Variables
//!
//! - `S3_BUCKET`: bucket holding configuration and snapshots
//! - `S3_PREFIX`: key prefix for snapshots and settings (default: `course-watch`)
//! - `CONFIG_S3_PREFIX`: prefix of `config.toml` (default: `{S3_PREFIX}/config`)
//! - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `PORTAL_SESSION_COOKIE`: secrets
//! - `RUST_LOG`: Log level (e.g., `info`, `debug`)

use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::{error, info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use course_watch::{
    config::LambdaConfigLoader,
    error::Result,
    models::{Config, StorageBackend},
    pipeline::{Monitor, RunSummary},
    storage::S3Store,
};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> std::result::Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Course Watch Lambda starting...");
    lambda_runtime::run(service_fn(handler)).await
}

/// Handler for AWS Lambda events.
#[instrument(skip(event))]
async fn handler(event: LambdaEvent<Value>) -> std::result::Result<Value, LambdaError> {
    info!("Received event: {:?}", event.payload);

    match run_monitor().await {
        Ok(summary) => {
            info!(
                "Lambda run complete: {} changed, {} failed",
                summary.changed(),
                summary.failed()
            );
            Ok(serde_json::json!({
                "status": "success",
                "summary": summary,
            }))
        }
        Err(e) => {
            error!("Lambda execution failed: {}", e);
            Ok(serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            }))
        }
    }
}

fn config_prefix(storage_prefix: &str) -> String {
    std::env::var("CONFIG_S3_PREFIX").unwrap_or_else(|_| {
        let trimmed = storage_prefix.trim_matches('/');
        if trimmed.is_empty() {
            "config".to_string()
        } else {
            format!("{trimmed}/config")
        }
    })
}

/// One monitor run with configuration and snapshots in S3.
async fn run_monitor() -> Result<RunSummary> {
    // Bucket and prefix come from the environment before the file is read
    let mut bootstrap = Config::default();
    bootstrap.apply_env();
    let storage = S3Store::from_config(&bootstrap.storage).await?;

    let loader = LambdaConfigLoader::new(storage, &config_prefix(&bootstrap.storage.s3_prefix));
    let mut config = loader.load_config().await?;

    // Lambda has no durable local disk
    if config.storage.backend != StorageBackend::S3 {
        info!("Overriding storage backend to s3");
        config.storage.backend = StorageBackend::S3;
    }
    if config.storage.s3_bucket.is_none() {
        config.storage.s3_bucket = bootstrap.storage.s3_bucket.clone();
    }
    config.validate()?;

    let monitor = Monitor::from_config(&config).await?;
    let summary = monitor.run_once(&config.courses()).await?;
    summary.log();
    Ok(summary)
}
