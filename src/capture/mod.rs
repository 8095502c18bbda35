// src/capture/mod.rs
//! Frame acquisition
//!
//! - **Frame**: immutable captured frame, payload shared via `Bytes`
//! - **Sources**: device-backed and mock frame sources with fallback
//! - **Ring Buffer**: duration-bounded pre-roll store per camera
//!
//! Each camera's capture loop owns its source and feeds both the ring buffer
//! and the motion detector on every frame.

pub mod frame;
pub mod ring_buffer;
pub mod source;

pub use frame::Frame;
pub use ring_buffer::RingBuffer;
pub use source::{
    DeviceSource, FallbackPolicy, FrameSource, MockSource, MotionBurst, ResilientSource,
    SourceKind,
};
