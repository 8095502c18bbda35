// src/main.rs
//! Critterwatch Recording Engine
//!
//! Continuous multi-camera capture with motion-triggered clip recording.

use anyhow::Result;
use critterwatch_engine::observability::init_tracing;
use critterwatch_engine::pipeline::supervisor::PipelineSupervisor;
use critterwatch_engine::utils::config::EngineConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting Critterwatch Recording Engine v{}", env!("CARGO_PKG_VERSION"));

    // Configuration errors are the only fatal ones
    let config = EngineConfig::load()?;
    info!(
        cameras = config.cameras.len(),
        base_dir = %config.storage.base_dir.display(),
        "Configuration loaded"
    );

    let supervisor = PipelineSupervisor::start(config).await?;

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Received shutdown signal, cleaning up...");

    // Flushes in-progress clips and joins every camera task
    supervisor.shutdown().await;

    info!("All pipelines stopped gracefully");
    Ok(())
}
