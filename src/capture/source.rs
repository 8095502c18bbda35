// src/capture/source.rs
//! Frame sources
//!
//! A `FrameSource` yields a lazy, non-restartable sequence of frames for one
//! camera. Two variants exist, selected at construction:
//!
//! - **DeviceSource**: reads raw frames from a device node
//! - **MockSource**: synthesizes frames, optionally with scripted motion
//!
//! `ResilientSource` wraps a device source with the documented fallback
//! policy: bounded exponential backoff on open, bounded in-place retries on
//! read, then a permanent switch to a mock source with the camera marked
//! degraded. Source failure never takes down the pipeline.

use crate::capture::frame::Frame;
use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Device,
    Mock,
}

/// Produces the frame sequence for a single camera
pub trait FrameSource: Send {
    /// Acquire the next frame. Errors are transient; the caller decides
    /// whether to retry or fall back.
    fn next_frame(&mut self) -> Result<Frame>;

    fn kind(&self) -> SourceKind;
}

/// Hardware-backed source reading raw grayscale frames from a device node
pub struct DeviceSource {
    camera_id: Arc<str>,
    device: File,
    width: u32,
    height: u32,
    sequence: u64,
}

impl DeviceSource {
    /// Open the device node. Fails with `DeviceUnavailable` if it cannot be
    /// opened.
    pub fn open(camera_id: Arc<str>, path: &str, width: u32, height: u32) -> Result<Self> {
        let device = File::open(path).map_err(|e| EngineError::DeviceUnavailable {
            camera: camera_id.to_string(),
            reason: format!("{}: {}", path, e),
        })?;

        debug!(camera = %camera_id, path, "Opened capture device");

        Ok(Self {
            camera_id,
            device,
            width,
            height,
            sequence: 0,
        })
    }
}

impl FrameSource for DeviceSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let mut buf = vec![0u8; (self.width * self.height) as usize];
        self.device
            .read_exact(&mut buf)
            .map_err(|e| EngineError::FrameRead(format!("camera {}: {}", self.camera_id, e)))?;

        let frame = Frame::new(
            Arc::clone(&self.camera_id),
            self.sequence,
            self.width,
            self.height,
            Bytes::from(buf),
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Device
    }
}

/// A scripted moving object for the mock source, active over a sequence range
#[derive(Debug, Clone)]
pub struct MotionBurst {
    /// First frame sequence the object appears in
    pub from_seq: u64,

    /// First frame sequence the object no longer appears in
    pub until_seq: u64,

    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    /// Pixel value of the object, against a dark background
    pub intensity: u8,
}

impl MotionBurst {
    fn active(&self, seq: u64) -> bool {
        seq >= self.from_seq && seq < self.until_seq
    }
}

/// Deterministic synthetic source for tests and device fallback
pub struct MockSource {
    camera_id: Arc<str>,
    width: u32,
    height: u32,
    sequence: u64,
    bursts: Vec<MotionBurst>,
    noise: u8,
    rng: SmallRng,
}

impl MockSource {
    pub fn new(camera_id: Arc<str>, width: u32, height: u32) -> Self {
        Self {
            camera_id,
            width,
            height,
            sequence: 0,
            bursts: Vec::new(),
            noise: 0,
            rng: SmallRng::seed_from_u64(0),
        }
    }

    /// Script a synthetic object into the frame stream
    pub fn with_burst(mut self, burst: MotionBurst) -> Self {
        self.bursts.push(burst);
        self
    }

    /// Add per-pixel noise of the given amplitude, seeded deterministically
    pub fn with_noise(mut self, amplitude: u8, seed: u64) -> Self {
        self.noise = amplitude;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }
}

impl FrameSource for MockSource {
    fn next_frame(&mut self) -> Result<Frame> {
        const BACKGROUND: u8 = 16;

        let mut data = vec![BACKGROUND; (self.width * self.height) as usize];

        if self.noise > 0 {
            for px in data.iter_mut() {
                *px = px.saturating_add(self.rng.gen_range(0..=self.noise));
            }
        }

        for burst in self.bursts.iter().filter(|b| b.active(self.sequence)) {
            let x_end = (burst.x + burst.width).min(self.width);
            let y_end = (burst.y + burst.height).min(self.height);
            for y in burst.y..y_end {
                for x in burst.x..x_end {
                    data[(y * self.width + x) as usize] = burst.intensity;
                }
            }
        }

        let frame = Frame::new(
            Arc::clone(&self.camera_id),
            self.sequence,
            self.width,
            self.height,
            Bytes::from(data),
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mock
    }
}

/// Fallback policy for a resilient source
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    /// Device open attempts before falling back to mock
    pub max_open_attempts: u32,

    /// Initial backoff between open attempts, doubled each retry
    pub backoff_base: Duration,

    /// Cap on a single backoff delay
    pub backoff_cap: Duration,

    /// Consecutive read failures tolerated before falling back to mock
    pub max_read_failures: u32,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            max_open_attempts: 3,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(5),
            max_read_failures: 5,
        }
    }
}

/// A source that degrades to mock output instead of failing
pub struct ResilientSource {
    camera_id: Arc<str>,
    width: u32,
    height: u32,
    inner: Box<dyn FrameSource>,
    policy: FallbackPolicy,
    consecutive_read_failures: u32,
    degraded: bool,
}

impl ResilientSource {
    /// Connect to a device node, retrying with exponential backoff. If every
    /// attempt fails, starts degraded on a mock source.
    pub async fn connect(
        camera_id: Arc<str>,
        device_path: &str,
        width: u32,
        height: u32,
        policy: FallbackPolicy,
    ) -> Self {
        let mut delay = policy.backoff_base;

        for attempt in 1..=policy.max_open_attempts {
            match DeviceSource::open(Arc::clone(&camera_id), device_path, width, height) {
                Ok(source) => {
                    info!(camera = %camera_id, attempt, "Capture device connected");
                    return Self {
                        camera_id,
                        width,
                        height,
                        inner: Box::new(source),
                        policy,
                        consecutive_read_failures: 0,
                        degraded: false,
                    };
                }
                Err(e) => {
                    warn!(
                        camera = %camera_id,
                        attempt,
                        max_attempts = policy.max_open_attempts,
                        error = %e,
                        "Device open failed"
                    );
                    if attempt < policy.max_open_attempts {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(policy.backoff_cap);
                    }
                }
            }
        }

        warn!(camera = %camera_id, "Device unavailable, falling back to mock source");
        let mock = MockSource::new(Arc::clone(&camera_id), width, height);
        Self {
            camera_id,
            width,
            height,
            inner: Box::new(mock),
            policy,
            consecutive_read_failures: 0,
            degraded: true,
        }
    }

    /// Build directly on a mock source (cameras configured without a device)
    pub fn mock(source: MockSource, policy: FallbackPolicy) -> Self {
        Self {
            camera_id: Arc::clone(&source.camera_id),
            width: source.width,
            height: source.height,
            inner: Box::new(source),
            policy,
            consecutive_read_failures: 0,
            degraded: false,
        }
    }

    /// Whether the source has fallen back to mock output
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn fall_back_to_mock(&mut self) {
        warn!(
            camera = %self.camera_id,
            failures = self.consecutive_read_failures,
            "Read failures exhausted retries, falling back to mock source"
        );
        self.inner = Box::new(MockSource::new(
            Arc::clone(&self.camera_id),
            self.width,
            self.height,
        ));
        self.consecutive_read_failures = 0;
        self.degraded = true;
    }
}

impl FrameSource for ResilientSource {
    fn next_frame(&mut self) -> Result<Frame> {
        match self.inner.next_frame() {
            Ok(frame) => {
                self.consecutive_read_failures = 0;
                Ok(frame)
            }
            Err(e) => {
                self.consecutive_read_failures += 1;
                debug!(
                    camera = %self.camera_id,
                    failures = self.consecutive_read_failures,
                    error = %e,
                    "Frame read failed"
                );

                if self.consecutive_read_failures >= self.policy.max_read_failures {
                    self.fall_back_to_mock();
                    // First mock frame stands in for the failed read
                    return self.inner.next_frame();
                }
                Err(e)
            }
        }
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_is_deterministic() {
        let mut a = MockSource::new("cam".into(), 8, 8);
        let mut b = MockSource::new("cam".into(), 8, 8);

        let fa = a.next_frame().unwrap();
        let fb = b.next_frame().unwrap();
        assert_eq!(fa.data, fb.data);
        assert_eq!(fa.sequence, 0);
        assert_eq!(a.next_frame().unwrap().sequence, 1);
    }

    #[test]
    fn test_mock_burst_appears_in_range() {
        let mut source = MockSource::new("cam".into(), 16, 16).with_burst(MotionBurst {
            from_seq: 1,
            until_seq: 3,
            x: 4,
            y: 4,
            width: 2,
            height: 2,
            intensity: 240,
        });

        let quiet = source.next_frame().unwrap();
        assert_eq!(quiet.pixel(4, 4), 16);

        let active = source.next_frame().unwrap();
        assert_eq!(active.pixel(4, 4), 240);
        assert_eq!(active.pixel(5, 5), 240);
        assert_eq!(active.pixel(6, 6), 16);

        source.next_frame().unwrap();
        let after = source.next_frame().unwrap();
        assert_eq!(after.pixel(4, 4), 16);
    }

    #[test]
    fn test_burst_clipped_to_frame() {
        let mut source = MockSource::new("cam".into(), 8, 8).with_burst(MotionBurst {
            from_seq: 0,
            until_seq: 1,
            x: 6,
            y: 6,
            width: 10,
            height: 10,
            intensity: 255,
        });

        let frame = source.next_frame().unwrap();
        assert!(frame.is_well_formed());
        assert_eq!(frame.pixel(7, 7), 255);
    }

    #[test]
    fn test_device_open_failure() {
        let result = DeviceSource::open("cam".into(), "/nonexistent/video9", 4, 4);
        assert!(matches!(
            result,
            Err(EngineError::DeviceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_falls_back_to_mock() {
        let policy = FallbackPolicy {
            max_open_attempts: 2,
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(2),
            max_read_failures: 3,
        };

        let mut source =
            ResilientSource::connect("cam".into(), "/nonexistent/video9", 4, 4, policy).await;

        assert!(source.is_degraded());
        assert_eq!(source.kind(), SourceKind::Mock);
        assert!(source.next_frame().is_ok());
    }

    struct FailingSource {
        camera_id: Arc<str>,
    }

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<Frame> {
            Err(EngineError::FrameRead(format!(
                "camera {}: simulated",
                self.camera_id
            )))
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Device
        }
    }

    #[test]
    fn test_read_failures_trigger_mock_fallback() {
        let mut source = ResilientSource {
            camera_id: "cam".into(),
            width: 4,
            height: 4,
            inner: Box::new(FailingSource {
                camera_id: "cam".into(),
            }),
            policy: FallbackPolicy {
                max_read_failures: 2,
                ..Default::default()
            },
            consecutive_read_failures: 0,
            degraded: false,
        };

        assert!(source.next_frame().is_err());
        assert!(!source.is_degraded());

        // Second consecutive failure exhausts the retry budget
        let frame = source.next_frame().unwrap();
        assert!(source.is_degraded());
        assert!(frame.is_well_formed());
    }
}
