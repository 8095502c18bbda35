// src/utils/errors.rs
//! Error taxonomy for the recording pipeline
//!
//! Every per-frame and per-clip failure is recoverable and stays inside the
//! owning camera's pipeline. Only `ConfigError` is fatal, and only at startup.

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Pipeline error types
#[derive(Debug, Error)]
pub enum EngineError {
    /// Camera device could not be opened. Retried with backoff, then the
    /// pipeline falls back to a mock source and keeps running degraded.
    #[error("device unavailable for camera {camera}: {reason}")]
    DeviceUnavailable { camera: String, reason: String },

    /// Single-frame read error, retried in place
    #[error("frame read failed: {0}")]
    FrameRead(String),

    /// Clip or event-log write failed; the clip is discarded and the
    /// pipeline continues
    #[error("storage failed: {0}")]
    StorageFailed(String),

    /// Frame hand-off or clip assembly failure inside the recorder
    #[error("recording failed: {0}")]
    RecordingFailed(String),

    /// Invalid or missing configuration. Fatal at startup only.
    #[error("config error: {0}")]
    ConfigError(String),
}

impl EngineError {
    /// Whether the error may abort process startup. Everything except
    /// configuration errors must be absorbed by the owning pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::ConfigError(_))
    }
}
