// src/recording/mod.rs
//! Clip recording and persistence
//!
//! - **Frame Queue**: lock-free capture-to-writer hand-off
//! - **Engine**: pre-roll + live accumulation, post-roll and max-duration
//! - **Writer**: clip container serialization and naming
//! - **Event Log**: append-only SQLite record of every clip
//!
//! # Architecture
//!
//! ```text
//! Capture loop → push_live() → Lock-Free Queue → Recording Task
//!                                                     ↓
//!                                      pre-roll snapshot + live frames
//!                                                     ↓
//!                                      post-roll / max-duration deadline
//!                                                     ↓
//!                                      ClipWriter (raw | rawz)
//!                                                     ↓
//!                                      EventLog (SQLite, durable)
//! ```

pub mod engine;
pub mod event_log;
pub mod frame_queue;
pub mod writer;

pub use engine::{RecordingEngine, RecordingHandle};
pub use event_log::{ClipRecord, ClipStatus, EventLog};
pub use frame_queue::{FrameQueue, FrameQueueStats};
pub use writer::ClipWriter;
