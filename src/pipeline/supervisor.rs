// src/pipeline/supervisor.rs
//! Pipeline fan-out and lifecycle
//!
//! Builds one independent pipeline task per enabled camera, tracks camera
//! health for the external dashboard, and performs fan-out cancellation on
//! shutdown: every pipeline is cancelled, flushes its in-progress clip, and
//! is joined before the process exits. No lock spans multiple cameras.

use crate::pipeline::camera::{CameraPipeline, PipelineStats};
use crate::recording::event_log::EventLog;
use crate::recording::writer::ClipWriter;
use crate::utils::config::EngineConfig;
use crate::utils::errors::Result;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Dashboard-facing camera status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraHealth {
    Running,

    /// Still capturing, but on a fallback path (e.g. mock source)
    Degraded(String),

    Stopped,
}

/// Per-camera health, shared read-mostly with the status surface
#[derive(Default)]
pub struct HealthRegistry {
    cameras: DashMap<String, CameraHealth>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, camera: &str, health: CameraHealth) {
        self.cameras.insert(camera.to_string(), health);
    }

    pub fn get(&self, camera: &str) -> Option<CameraHealth> {
        self.cameras.get(camera).map(|h| h.clone())
    }

    pub fn snapshot(&self) -> HashMap<String, CameraHealth> {
        self.cameras
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// Owns all camera pipelines for the process lifetime
pub struct PipelineSupervisor {
    event_log: Arc<EventLog>,
    health: Arc<HealthRegistry>,
    cancel: CancellationToken,
    tasks: Vec<(String, JoinHandle<PipelineStats>)>,
}

impl PipelineSupervisor {
    /// Open shared storage and spawn one pipeline per enabled camera.
    /// Fails only on startup storage errors; per-camera device problems
    /// degrade the camera instead.
    pub async fn start(config: EngineConfig) -> Result<Self> {
        let event_log = Arc::new(EventLog::open(&config.event_db_path()).await?);
        let writer = Arc::new(ClipWriter::new(&config.storage, config.recording.format));
        let health = Arc::new(HealthRegistry::new());
        let cancel = CancellationToken::new();

        let mut tasks = Vec::new();
        for camera in config.enabled_cameras().cloned().collect::<Vec<_>>() {
            let name = camera.name.clone();
            let pipeline = CameraPipeline::new(
                camera,
                &config,
                Arc::clone(&writer),
                Arc::clone(&event_log),
                Arc::clone(&health),
                cancel.child_token(),
            )
            .await;

            tasks.push((name, tokio::spawn(pipeline.run())));
        }

        info!(cameras = tasks.len(), "Pipeline supervisor started");

        Ok(Self {
            event_log,
            health,
            cancel,
            tasks,
        })
    }

    /// The shared event log's read surface
    pub fn event_log(&self) -> Arc<EventLog> {
        Arc::clone(&self.event_log)
    }

    pub fn health(&self) -> Arc<HealthRegistry> {
        Arc::clone(&self.health)
    }

    /// Cancel every pipeline and join them all before returning
    pub async fn shutdown(self) {
        info!("Shutting down all camera pipelines");
        self.cancel.cancel();

        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(stats) => info!(
                    camera = %name,
                    frames = stats.frames_captured,
                    clips = stats.clips_started,
                    "Pipeline joined"
                ),
                Err(e) => error!(camera = %name, error = %e, "Pipeline task panicked"),
            }
        }
    }
}
