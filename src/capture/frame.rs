// src/capture/frame.rs
//! Frame type shared across the pipeline
//!
//! Frames are produced by a `FrameSource`, fed to the ring buffer and the
//! motion detector, and never mutated after creation. The payload lives in a
//! `Bytes` handle so ring buffer, detector and recorder share one allocation.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// A single captured frame, 8-bit grayscale
#[derive(Debug, Clone)]
pub struct Frame {
    /// Owning camera's name
    pub camera_id: Arc<str>,

    /// Monotonic frame counter within the source
    pub sequence: u64,

    /// Monotonic capture time, used for all buffer and trigger arithmetic
    pub timestamp: Instant,

    /// Wall-clock capture time, used for file names and event records
    pub captured_at: DateTime<Utc>,

    pub width: u32,
    pub height: u32,

    /// Raw pixel payload, `width * height` bytes
    pub data: Bytes,
}

impl Frame {
    pub fn new(
        camera_id: Arc<str>,
        sequence: u64,
        width: u32,
        height: u32,
        data: Bytes,
    ) -> Self {
        Self {
            camera_id,
            sequence,
            timestamp: Instant::now(),
            captured_at: Utc::now(),
            width,
            height,
            data,
        }
    }

    /// Pixel value at (x, y). Callers must stay within frame bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    /// Whether the payload matches the declared dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize)
    }
}
