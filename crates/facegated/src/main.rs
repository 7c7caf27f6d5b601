use anyhow::{Context, Result};
use facegate_core::memory::{MemoryDetectionService, MemoryImageStore};
use facegate_core::{DetectionService, ImageStore};
use facegated::{AppState, BackendKind, Config};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = Config::load().context("loading configuration")?;

    // Clients are created once here and shared for the process lifetime.
    let detection: Arc<dyn DetectionService>;
    let store: Arc<dyn ImageStore>;
    match config.backend {
        BackendKind::Aws => {
            let aws = facegate_aws::AwsBackend::connect(config.bucket_name()).await;
            detection = Arc::new(aws.detection);
            store = Arc::new(aws.store);
        }
        BackendKind::Memory => {
            tracing::warn!("using in-memory backends; nothing reaches a real detection service");
            detection = Arc::new(MemoryDetectionService::new());
            store = Arc::new(MemoryImageStore::new());
        }
    }

    let state = AppState::new(&config, detection, store).context("building services")?;

    tracing::info!(
        addr = %config.listen_addr,
        origins = ?config.allowed_origins,
        backend = ?config.backend,
        "facegated ready"
    );

    facegated::run_server(&config.listen_addr, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
    })
    .await
    .context("serving HTTP")?;

    tracing::info!("facegated shutting down");
    Ok(())
}
