// src/observability/mod.rs
//! Tracing initialization
//!
//! Structured logging through `tracing`, filtered by `RUST_LOG` with a
//! sensible default. Metrics are emitted through the `metrics` facade at
//! the call sites; wiring an exporter is an embedder concern.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,critterwatch_engine=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}
