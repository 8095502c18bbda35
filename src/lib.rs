// src/lib.rs
//! Critterwatch Recording Engine Library
//!
//! Core of a multi-camera, motion-triggered recording system: frames are
//! captured continuously per camera, analyzed for motion within configured
//! zones, and assembled into clips with pre-trigger context and a post-roll
//! tail, guarded by a per-camera cooldown.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **capture**: frame sources, ring buffer for pre-roll context
//! - **motion**: per-zone frame-differencing detection
//! - **trigger**: sensor inputs and the per-camera trigger state machine
//! - **recording**: clip assembly, container writing, event log
//! - **pipeline**: per-camera task wiring and supervised shutdown
//! - **observability**: tracing setup
//! - **utils**: configuration and error taxonomy

// Public module exports
pub mod capture;
pub mod motion;
pub mod observability;
pub mod pipeline;
pub mod recording;
pub mod trigger;
pub mod utils;

// Re-export commonly used types
pub use pipeline::supervisor::{CameraHealth, PipelineSupervisor};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
