// src/capture/ring_buffer.rs
//! Pre-roll ring buffer
//!
//! Keeps the most recent frames of one camera, bounded by *time* rather than
//! frame count so the window stays correct when the frame rate drifts. The
//! capture task is the only writer and the recording engine the only reader;
//! both sides hold the lock just long enough to append or copy, well under
//! one frame interval.

use crate::capture::frame::Frame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Duration-bounded FIFO of recent frames for one camera
pub struct RingBuffer {
    window: Duration,
    frames: Mutex<VecDeque<Frame>>,
}

impl RingBuffer {
    /// Create a buffer holding `window` seconds of pre-trigger context
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            frames: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a frame and evict everything older than the window relative to
    /// it. Amortized O(1): each frame is pushed and popped at most once.
    pub fn push(&self, frame: Frame) {
        let mut frames = self.frames.lock();

        let cutoff = frame.timestamp.checked_sub(self.window);
        if let Some(cutoff) = cutoff {
            while frames
                .front()
                .is_some_and(|oldest| oldest.timestamp < cutoff)
            {
                frames.pop_front();
            }
        }

        frames.push_back(frame);
    }

    /// Ordered copy of the currently buffered frames, oldest first. Frame
    /// payloads are shared, so this copies handles, not pixels.
    pub fn snapshot(&self) -> Vec<Frame> {
        let frames = self.frames.lock();
        frames.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Configured window length
    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn frame_at(base: Instant, offset_ms: u64, seq: u64) -> Frame {
        Frame {
            camera_id: Arc::from("cam"),
            sequence: seq,
            timestamp: base + Duration::from_millis(offset_ms),
            captured_at: chrono::Utc::now(),
            width: 2,
            height: 2,
            data: Bytes::from(vec![0u8; 4]),
        }
    }

    #[test]
    fn test_push_and_snapshot_ordered() {
        let buffer = RingBuffer::new(Duration::from_secs(2));
        let base = Instant::now();

        for i in 0..5 {
            buffer.push(frame_at(base, i * 100, i));
        }

        let snap = buffer.snapshot();
        assert_eq!(snap.len(), 5);
        let sequences: Vec<_> = snap.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_eviction_by_age_not_count() {
        let buffer = RingBuffer::new(Duration::from_secs(2));
        let base = Instant::now();

        buffer.push(frame_at(base, 0, 0));
        buffer.push(frame_at(base, 500, 1));
        // 2.6s later: the first two frames fall outside the window
        buffer.push(frame_at(base, 2600, 2));

        let snap = buffer.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].sequence, 2);
    }

    #[test]
    fn test_frame_exactly_at_window_edge_kept() {
        let buffer = RingBuffer::new(Duration::from_secs(2));
        let base = Instant::now();

        buffer.push(frame_at(base, 0, 0));
        buffer.push(frame_at(base, 2000, 1));

        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_snapshot_of_empty_buffer() {
        let buffer = RingBuffer::new(Duration::from_secs(1));
        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_writer_and_reader() {
        let buffer = Arc::new(RingBuffer::new(Duration::from_secs(5)));
        let base = Instant::now();

        let writer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    buffer.push(frame_at(base, i, i));
                }
            })
        };

        let reader = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let snap = buffer.snapshot();
                    // Snapshots are always internally ordered
                    assert!(snap.windows(2).all(|w| w[0].sequence < w[1].sequence));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(buffer.len(), 1000);
    }

    proptest! {
        #[test]
        fn prop_snapshot_stays_within_window(
            offsets in proptest::collection::vec(0u64..10_000, 1..200),
            window_ms in 1u64..5_000,
        ) {
            let buffer = RingBuffer::new(Duration::from_millis(window_ms));
            let base = Instant::now();

            let mut sorted = offsets;
            sorted.sort_unstable();

            for (i, offset) in sorted.iter().enumerate() {
                buffer.push(frame_at(base, *offset, i as u64));
            }

            let snap = buffer.snapshot();
            prop_assert!(!snap.is_empty());

            let newest = snap.last().unwrap().timestamp;
            for frame in &snap {
                prop_assert!(newest.duration_since(frame.timestamp) <= Duration::from_millis(window_ms));
            }
        }
    }
}
