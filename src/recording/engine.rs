// src/recording/engine.rs
//! Recording engine
//!
//! On a trigger, takes the ring-buffer snapshot as pre-roll and accumulates
//! live frames until no qualifying event has been seen for the post-roll
//! window or the clip reaches its maximum duration. The accumulation and
//! file write run on their own task so slow disk I/O never blocks capture
//! or detection; hand-off is the lock-free `FrameQueue`.
//!
//! At most one recording is active per camera. Storage failures discard the
//! in-memory clip, log the failure to the event log, and leave the pipeline
//! running.

use crate::capture::frame::Frame;
use crate::capture::ring_buffer::RingBuffer;
use crate::pipeline::supervisor::{CameraHealth, HealthRegistry};
use crate::recording::event_log::{ClipRecord, ClipStatus, EventLog};
use crate::recording::frame_queue::FrameQueue;
use crate::recording::writer::ClipWriter;
use crate::trigger::coordinator::StartRecording;
use crate::utils::config::RecordingConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// Qualifying activity seen while a recording runs
#[derive(Debug, Clone, Copy)]
struct Activity {
    last_qualifying: Instant,
    peak_area: u32,
}

/// Handle to one in-flight recording
pub struct RecordingHandle {
    queue: Arc<FrameQueue>,
    activity_tx: watch::Sender<Activity>,
    task: JoinHandle<()>,
}

impl RecordingHandle {
    /// Hand a live frame to the recording task. Never blocks; the queue
    /// drops its oldest frame when the writer stalls.
    pub fn push_live(&self, frame: Frame) {
        self.queue.push(frame);
    }

    /// A further qualifying event arrived; refresh the post-roll deadline.
    pub fn extend(&self, at: Instant, area: u32) {
        self.activity_tx.send_modify(|activity| {
            if at > activity.last_qualifying {
                activity.last_qualifying = at;
            }
            activity.peak_area = activity.peak_area.max(area);
        });
    }

    /// Whether the clip has been finalized
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for finalization to complete
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Recording task panicked");
        }
    }
}

/// Builds and persists clips for one camera
pub struct RecordingEngine {
    camera_id: Arc<str>,
    config: RecordingConfig,
    ring_buffer: Arc<RingBuffer>,
    writer: Arc<ClipWriter>,
    event_log: Arc<EventLog>,
    health: Arc<HealthRegistry>,
    queue_capacity: usize,
}

impl RecordingEngine {
    pub fn new(
        camera_id: Arc<str>,
        config: RecordingConfig,
        ring_buffer: Arc<RingBuffer>,
        writer: Arc<ClipWriter>,
        event_log: Arc<EventLog>,
        health: Arc<HealthRegistry>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            camera_id,
            config,
            ring_buffer,
            writer,
            event_log,
            health,
            queue_capacity,
        }
    }

    /// Start a recording for the given trigger. The pre-roll is captured
    /// here, synchronously with the trigger decision, so no further frames
    /// slip between snapshot and start.
    pub fn start(&self, cmd: StartRecording, cancel: CancellationToken) -> RecordingHandle {
        let preroll = self.ring_buffer.snapshot();
        debug!(
            camera = %self.camera_id,
            reason = cmd.reason.as_str(),
            preroll_frames = preroll.len(),
            "Recording started"
        );

        let queue = Arc::new(FrameQueue::new(self.queue_capacity));
        let (activity_tx, activity_rx) = watch::channel(Activity {
            last_qualifying: cmd.at,
            peak_area: cmd.peak_area,
        });

        let task = tokio::spawn(run_recording(
            Arc::clone(&self.camera_id),
            self.config.clone(),
            cmd,
            preroll,
            Arc::clone(&queue),
            activity_rx,
            Arc::clone(&self.writer),
            Arc::clone(&self.event_log),
            Arc::clone(&self.health),
            cancel,
        ));

        RecordingHandle {
            queue,
            activity_tx,
            task,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_recording(
    camera_id: Arc<str>,
    config: RecordingConfig,
    cmd: StartRecording,
    preroll: Vec<Frame>,
    queue: Arc<FrameQueue>,
    mut activity_rx: watch::Receiver<Activity>,
    writer: Arc<ClipWriter>,
    event_log: Arc<EventLog>,
    health: Arc<HealthRegistry>,
    cancel: CancellationToken,
) {
    let mut frames = preroll;
    let clip_start = frames.first().map(|f| f.timestamp).unwrap_or(cmd.at);
    let hard_deadline = clip_start + config.max_clip();
    let post_record = config.post_record();
    let mut truncated = false;

    loop {
        while let Some(frame) = queue.try_pop() {
            frames.push(frame);
        }

        let activity = *activity_rx.borrow_and_update();
        let deadline = (activity.last_qualifying + post_record).min(hard_deadline);
        let now = Instant::now();

        if now >= deadline {
            if deadline == hard_deadline {
                info!(camera = %camera_id, "Clip reached maximum duration");
            }
            break;
        }

        // Short sleep cap keeps the queue drained even without activity
        let sleep_for = deadline.duration_since(now).min(Duration::from_millis(50));
        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = activity_rx.changed() => {}
            _ = cancel.cancelled() => {
                warn!(camera = %camera_id, "Recording cancelled, flushing truncated clip");
                truncated = true;
                break;
            }
        }
    }

    while let Some(frame) = queue.try_pop() {
        frames.push(frame);
    }
    // Enforce the hard cap even if late frames were queued
    frames.retain(|f| f.timestamp <= hard_deadline);

    let peak_area = activity_rx.borrow().peak_area;
    finalize(
        &camera_id, &cmd, frames, peak_area, truncated, &writer, &event_log, &health,
    )
    .await;
}

/// Serialize the clip, append its record, and surface failures as events
/// rather than errors. Nothing here can take down the pipeline.
#[allow(clippy::too_many_arguments)]
async fn finalize(
    camera_id: &Arc<str>,
    cmd: &StartRecording,
    frames: Vec<Frame>,
    peak_area: u32,
    truncated: bool,
    writer: &ClipWriter,
    event_log: &EventLog,
    health: &HealthRegistry,
) {
    let id = Ulid::new();
    let started_at = frames
        .first()
        .map(|f| f.captured_at)
        .unwrap_or_else(chrono::Utc::now);
    let ended_at = frames
        .last()
        .map(|f| f.captured_at)
        .unwrap_or_else(chrono::Utc::now);
    let frame_count = frames.len() as u32;

    let mut record = ClipRecord {
        id,
        camera_id: camera_id.to_string(),
        started_at,
        ended_at,
        reason: cmd.reason,
        path: None,
        peak_area,
        frame_count,
        truncated,
        status: ClipStatus::Ok,
    };

    match writer.write(camera_id, id, &frames).await {
        Ok(path) => {
            record.path = Some(path);
            metrics::counter!("critterwatch_clips_written_total").increment(1);

            if let Err(e) = writer.write_sidecar(&record).await {
                warn!(camera = %camera_id, error = %e, "Sidecar write failed");
            }
        }
        Err(e) => {
            error!(
                camera = %camera_id,
                clip = %id,
                error = %e,
                "Clip write failed, discarding clip"
            );
            record.status = ClipStatus::Failed;
            metrics::counter!("critterwatch_clips_failed_total").increment(1);

            // The dashboard must see the failure, not a healthy camera
            health.set(
                camera_id,
                CameraHealth::Degraded("storage write failed".to_string()),
            );
        }
    }

    // The record must be durable before the clip counts as closed
    if let Err(e) = event_log.append(&record).await {
        error!(camera = %camera_id, clip = %id, error = %e, "Event log append failed");
    } else {
        info!(
            camera = %camera_id,
            clip = %id,
            frames = frame_count,
            status = ?record.status,
            truncated,
            "Clip closed"
        );
    }
}
