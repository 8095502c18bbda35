// src/recording/writer.rs
//! Clip container writer
//!
//! Serializes an accumulated frame sequence to a single clip file. The
//! container is a length-prefixed frame stream behind a small header;
//! `rawz` runs the same stream through zstd. A JSON sidecar with the clip
//! record is written next to the container.
//!
//! Paths follow the configured naming pattern: optional date folder,
//! optional per-camera folder, then `{camera}_{YYYYmmdd_HHMMSS}_{ulid}.{ext}`.

use crate::capture::frame::Frame;
use crate::recording::event_log::ClipRecord;
use crate::utils::config::{ClipFormat, StorageConfig};
use crate::utils::errors::{EngineError, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};
use ulid::Ulid;

const MAGIC_RAW: &[u8; 8] = b"CWCLIP1\0";
const MAGIC_RAWZ: &[u8; 8] = b"CWCLIPZ1";

/// Writes clip containers and metadata sidecars
pub struct ClipWriter {
    base_dir: PathBuf,
    format: ClipFormat,
    by_date_folders: bool,
    per_camera_folders: bool,
}

impl ClipWriter {
    pub fn new(storage: &StorageConfig, format: ClipFormat) -> Self {
        Self {
            base_dir: storage.base_dir.clone(),
            format,
            by_date_folders: storage.by_date_folders,
            per_camera_folders: storage.per_camera_folders,
        }
    }

    /// Path a clip will be written to, per the naming pattern
    pub fn clip_path(&self, camera: &str, started_at: DateTime<Utc>, id: Ulid) -> PathBuf {
        let mut dir = self.base_dir.clone();
        if self.by_date_folders {
            dir = dir.join(started_at.format("%Y-%m-%d").to_string());
        }
        if self.per_camera_folders {
            dir = dir.join(camera);
        }
        dir.join(format!(
            "{}_{}_{}.{}",
            camera,
            started_at.format("%Y%m%d_%H%M%S"),
            id,
            self.format.extension()
        ))
    }

    /// Serialize the frames and write the container. Fails with
    /// `StorageFailed`; the caller discards the clip and continues.
    pub async fn write(&self, camera: &str, id: Ulid, frames: &[Frame]) -> Result<PathBuf> {
        if frames.is_empty() {
            return Err(EngineError::RecordingFailed(
                "clip contains no frames".to_string(),
            ));
        }

        let started_at = frames[0].captured_at;
        let path = self.clip_path(camera, started_at, id);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::StorageFailed(format!("failed to create clip directory: {}", e))
            })?;
        }

        let body = encode_frames(frames);
        let payload = match self.format {
            ClipFormat::Raw => {
                let mut out = Vec::with_capacity(body.len() + 8);
                out.extend_from_slice(MAGIC_RAW);
                out.extend_from_slice(&body);
                out
            }
            ClipFormat::Rawz => {
                let compressed = zstd::encode_all(body.as_slice(), 3).map_err(|e| {
                    EngineError::StorageFailed(format!("clip compression failed: {}", e))
                })?;
                let mut out = Vec::with_capacity(compressed.len() + 8);
                out.extend_from_slice(MAGIC_RAWZ);
                out.extend_from_slice(&compressed);
                out
            }
        };

        fs::write(&path, &payload).await.map_err(|e| {
            EngineError::StorageFailed(format!("failed to write clip {}: {}", path.display(), e))
        })?;

        info!(
            camera,
            path = %path.display(),
            frames = frames.len(),
            bytes = payload.len(),
            "Clip written"
        );

        Ok(path)
    }

    /// Write the clip record JSON next to the container
    pub async fn write_sidecar(&self, record: &ClipRecord) -> Result<()> {
        let Some(path) = &record.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(record).map_err(|e| {
            EngineError::StorageFailed(format!("failed to serialize clip record: {}", e))
        })?;

        let sidecar = path.with_extension("json");
        fs::write(&sidecar, json).await.map_err(|e| {
            EngineError::StorageFailed(format!("failed to write sidecar: {}", e))
        })?;

        debug!(path = %sidecar.display(), "Sidecar written");
        Ok(())
    }
}

/// Frame stream: header, then one record per frame
fn encode_frames(frames: &[Frame]) -> Vec<u8> {
    let first = &frames[0];
    let payload_size: usize = frames.iter().map(|f| f.data.len() + 12).sum();
    let mut out = Vec::with_capacity(payload_size + 64);

    out.extend_from_slice(&(first.camera_id.len() as u16).to_le_bytes());
    out.extend_from_slice(first.camera_id.as_bytes());
    out.extend_from_slice(&first.width.to_le_bytes());
    out.extend_from_slice(&first.height.to_le_bytes());
    out.extend_from_slice(&(frames.len() as u32).to_le_bytes());

    for frame in frames {
        out.extend_from_slice(&frame.captured_at.timestamp_micros().to_le_bytes());
        out.extend_from_slice(&(frame.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&frame.data);
    }

    out
}
