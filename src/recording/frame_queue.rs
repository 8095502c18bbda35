// src/recording/frame_queue.rs
//! Lock-free frame hand-off
//!
//! Bounded queue between a camera's capture loop and its recording task.
//! The capture side never blocks: when the writer stalls and the queue
//! fills, the oldest unwritten frame is dropped and counted.

use crate::capture::frame::Frame;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Bounded single-producer/single-consumer frame queue
pub struct FrameQueue {
    queue: ArrayQueue<Frame>,
    push_count: AtomicU64,
    pop_count: AtomicU64,
    drop_count: AtomicU64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            push_count: AtomicU64::new(0),
            pop_count: AtomicU64::new(0),
            drop_count: AtomicU64::new(0),
        }
    }

    /// Push a live frame without blocking. A full queue drops its oldest
    /// frame to make room; capture cadence is never sacrificed to disk I/O.
    pub fn push(&self, frame: Frame) {
        let mut frame = frame;
        while let Err(returned) = self.queue.push(frame) {
            frame = returned;
            if self.queue.pop().is_some() {
                let dropped = self.drop_count.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 100 == 1 {
                    warn!(
                        camera = %frame.camera_id,
                        dropped,
                        "Recording queue full, dropping oldest unwritten frames"
                    );
                }
                metrics::counter!("critterwatch_frames_dropped_total").increment(1);
            }
        }
        self.push_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Pop the oldest queued frame (non-blocking)
    pub fn try_pop(&self) -> Option<Frame> {
        let frame = self.queue.pop();
        if frame.is_some() {
            self.pop_count.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> FrameQueueStats {
        FrameQueueStats {
            push_count: self.push_count.load(Ordering::Relaxed),
            pop_count: self.pop_count.load(Ordering::Relaxed),
            drop_count: self.drop_count.load(Ordering::Relaxed),
            current_size: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }
}

/// Queue counters
#[derive(Debug, Clone)]
pub struct FrameQueueStats {
    pub push_count: u64,
    pub pop_count: u64,
    pub drop_count: u64,
    pub current_size: usize,
    pub capacity: usize,
}
