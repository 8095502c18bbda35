// src/utils/mod.rs
//! Common utilities
//!
//! - **Config**: engine configuration loading and validation
//! - **Errors**: crate-wide error taxonomy

pub mod config;
pub mod errors;

pub use config::EngineConfig;
pub use errors::{EngineError, Result};
