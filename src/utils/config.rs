// src/utils/config.rs
//! Engine configuration
//!
//! Loaded once at startup from a file plus `CRITTERWATCH_*` environment
//! overrides, validated, then handed into each pipeline at construction.
//! There is no process-global config cache; whoever builds a pipeline owns
//! the values it runs with.

use crate::utils::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub recording: RecordingConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub sensors: SensorConfig,

    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
}

/// Clip and event-log storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for clip files
    pub base_dir: PathBuf,

    /// SQLite event-log file name (created under `base_dir`)
    pub event_db: String,

    /// Organize clips into YYYY-MM-DD subfolders
    pub by_date_folders: bool,

    /// Organize clips into per-camera subfolders
    pub per_camera_folders: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("recordings"),
            event_db: "events.db".to_string(),
            by_date_folders: true,
            per_camera_folders: true,
        }
    }
}

/// Clip container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipFormat {
    /// Length-prefixed frame records, uncompressed
    Raw,

    /// Same stream, zstd-compressed
    Rawz,
}

impl ClipFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::Raw => "cwc",
            ClipFormat::Rawz => "cwz",
        }
    }
}

/// Recording timing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Container format for clip files
    pub format: ClipFormat,

    /// Hard cap on clip length (seconds)
    pub max_clip_duration: f64,

    /// Pre-trigger context kept in the ring buffer (seconds)
    pub pre_record_buffer: f64,

    /// Tail recorded after the last qualifying event (seconds)
    pub post_record_buffer: f64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            format: ClipFormat::Raw,
            max_clip_duration: 30.0,
            pre_record_buffer: 2.0,
            post_record_buffer: 3.0,
        }
    }
}

impl RecordingConfig {
    pub fn max_clip(&self) -> Duration {
        Duration::from_secs_f64(self.max_clip_duration)
    }

    pub fn pre_record(&self) -> Duration {
        Duration::from_secs_f64(self.pre_record_buffer)
    }

    pub fn post_record(&self) -> Duration {
        Duration::from_secs_f64(self.post_record_buffer)
    }
}

/// Motion detection parameters, shared by all cameras
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Detection sensitivity in [0, 1]; higher is more sensitive
    pub sensitivity: f64,

    /// Minimum changed-pixel count for a qualifying event
    pub min_area: u32,

    /// Minimum gap between independent clips per camera (seconds)
    pub cooldown_period: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.5,
            min_area: 500,
            cooldown_period: 10.0,
        }
    }
}

impl MotionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_period)
    }
}

/// Optional external digital-sensor inputs (GPIO pins)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Debounce window applied before signals reach the coordinator (seconds)
    pub debounce_time: f64,

    /// Camera name -> GPIO pin. Empty means motion-only triggering.
    #[serde(default)]
    pub pins: HashMap<String, u32>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            debounce_time: 0.2,
            pins: HashMap::new(),
        }
    }
}

impl SensorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f64(self.debounce_time)
    }
}

/// Per-camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Unique camera name, used in paths and event records
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Device node path. Absent means a mock source is used.
    #[serde(default)]
    pub device: Option<String>,

    /// Capture rate in frames per second
    pub framerate: f64,

    pub width: u32,
    pub height: u32,

    /// Motion zones. An empty list means the full frame is one zone.
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

impl CameraConfig {
    /// Interval between frames at the configured rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate)
    }
}

/// Rectangular motion zone within a camera's frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Load configuration from `critterwatch.toml` (if present) layered with
    /// `CRITTERWATCH_*` environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from("critterwatch")
    }

    /// Load from a named config file base path
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CRITTERWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EngineError::ConfigError(format!("failed to load config: {}", e)))?;

        let cfg: EngineConfig = settings
            .try_deserialize()
            .map_err(|e| EngineError::ConfigError(format!("invalid config: {}", e)))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate all settings. Any violation is startup-fatal.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.motion.sensitivity) {
            return Err(EngineError::ConfigError(format!(
                "motion.sensitivity must be in [0, 1], got {}",
                self.motion.sensitivity
            )));
        }
        if self.motion.min_area == 0 {
            return Err(EngineError::ConfigError(
                "motion.min_area must be at least 1".to_string(),
            ));
        }
        if self.motion.cooldown_period < 0.0 {
            return Err(EngineError::ConfigError(
                "motion.cooldown_period must not be negative".to_string(),
            ));
        }
        if self.recording.max_clip_duration <= 0.0 {
            return Err(EngineError::ConfigError(
                "recording.max_clip_duration must be positive".to_string(),
            ));
        }
        if self.recording.pre_record_buffer < 0.0 || self.recording.post_record_buffer < 0.0 {
            return Err(EngineError::ConfigError(
                "recording buffers must not be negative".to_string(),
            ));
        }
        if self.sensors.debounce_time < 0.0 {
            return Err(EngineError::ConfigError(
                "sensors.debounce_time must not be negative".to_string(),
            ));
        }

        let enabled: Vec<_> = self.cameras.iter().filter(|c| c.enabled).collect();
        if enabled.is_empty() {
            return Err(EngineError::ConfigError(
                "at least one enabled camera is required".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for camera in &self.cameras {
            if camera.name.is_empty() {
                return Err(EngineError::ConfigError(
                    "camera name must not be empty".to_string(),
                ));
            }
            if !seen.insert(camera.name.as_str()) {
                return Err(EngineError::ConfigError(format!(
                    "duplicate camera name: {}",
                    camera.name
                )));
            }
            if camera.framerate <= 0.0 || !camera.framerate.is_finite() {
                return Err(EngineError::ConfigError(format!(
                    "camera {}: framerate must be positive, got {}",
                    camera.name, camera.framerate
                )));
            }
            if camera.width == 0 || camera.height == 0 {
                return Err(EngineError::ConfigError(format!(
                    "camera {}: frame dimensions must be non-zero",
                    camera.name
                )));
            }
            for zone in &camera.zones {
                if zone.name.is_empty() {
                    return Err(EngineError::ConfigError(format!(
                        "camera {}: zone name must not be empty",
                        camera.name
                    )));
                }
                if zone.x >= camera.width || zone.y >= camera.height {
                    return Err(EngineError::ConfigError(format!(
                        "camera {}: zone {} origin lies outside the frame",
                        camera.name, zone.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// All cameras that should run a pipeline
    pub fn enabled_cameras(&self) -> impl Iterator<Item = &CameraConfig> {
        self.cameras.iter().filter(|c| c.enabled)
    }

    /// Full path of the event-log database
    pub fn event_db_path(&self) -> PathBuf {
        self.storage.base_dir.join(&self.storage.event_db)
    }
}
