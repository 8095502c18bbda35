// src/pipeline/mod.rs
//! Camera pipeline orchestration
//!
//! - **Camera**: one capture/detect/trigger task per camera
//! - **Supervisor**: fan-out construction, health registry, joined shutdown

pub mod camera;
pub mod supervisor;

pub use camera::{CameraPipeline, PipelineStats};
pub use supervisor::{CameraHealth, HealthRegistry, PipelineSupervisor};
