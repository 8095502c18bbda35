// src/pipeline/camera.rs
//! Per-camera pipeline task
//!
//! One task owns everything for its camera: the frame source, ring buffer,
//! motion detector, sensor input and trigger coordinator. Nothing is shared
//! across cameras; the only state shared with the recording task is the ring
//! buffer and the frame queue inside the recording handle.
//!
//! The capture step is paced by a tokio interval with skipped missed ticks,
//! so sustained overruns shed analysis work instead of accumulating lag.

use crate::capture::ring_buffer::RingBuffer;
use crate::capture::source::{FallbackPolicy, FrameSource, MockSource, ResilientSource};
use crate::motion::detector::MotionDetector;
use crate::motion::zone::Zone;
use crate::pipeline::supervisor::{CameraHealth, HealthRegistry};
use crate::recording::engine::{RecordingEngine, RecordingHandle};
use crate::recording::event_log::EventLog;
use crate::recording::writer::ClipWriter;
use crate::trigger::coordinator::{TriggerAction, TriggerCoordinator, TriggerState};
use crate::trigger::sensor::DebouncedSensor;
use crate::utils::config::{CameraConfig, EngineConfig};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Running totals for one camera's pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub frames_captured: u64,
    pub analysis_skipped: u64,
    pub clips_started: u64,
}

/// Continuous capture/detect/trigger unit for one camera
pub struct CameraPipeline {
    camera_id: Arc<str>,
    camera: CameraConfig,
    source: ResilientSource,
    ring_buffer: Arc<RingBuffer>,
    detector: MotionDetector,
    coordinator: TriggerCoordinator,
    sensor: Option<DebouncedSensor>,
    recording: RecordingEngine,
    health: Arc<HealthRegistry>,
    cancel: CancellationToken,
    stats: PipelineStats,
}

impl CameraPipeline {
    /// Build the pipeline for a configured camera, connecting to its device
    /// (or starting on a mock source when none is configured).
    pub async fn new(
        camera: CameraConfig,
        engine_config: &EngineConfig,
        writer: Arc<ClipWriter>,
        event_log: Arc<EventLog>,
        health: Arc<HealthRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        let camera_id: Arc<str> = Arc::from(camera.name.as_str());

        let source = match &camera.device {
            Some(path) => {
                ResilientSource::connect(
                    Arc::clone(&camera_id),
                    path,
                    camera.width,
                    camera.height,
                    FallbackPolicy::default(),
                )
                .await
            }
            None => ResilientSource::mock(
                MockSource::new(Arc::clone(&camera_id), camera.width, camera.height),
                FallbackPolicy::default(),
            ),
        };

        Self::with_source(camera, engine_config, source, writer, event_log, health, cancel)
    }

    /// Build on an explicit source. Tests use this to inject scripted mock
    /// sources.
    pub fn with_source(
        camera: CameraConfig,
        engine_config: &EngineConfig,
        source: ResilientSource,
        writer: Arc<ClipWriter>,
        event_log: Arc<EventLog>,
        health: Arc<HealthRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        let camera_id: Arc<str> = Arc::from(camera.name.as_str());

        let zones: Vec<Zone> = camera.zones.iter().map(Zone::from).collect();
        let detector = MotionDetector::new(
            Arc::clone(&camera_id),
            zones,
            camera.width,
            camera.height,
            &engine_config.motion,
        );

        let coordinator =
            TriggerCoordinator::new(Arc::clone(&camera_id), engine_config.motion.cooldown());

        let sensor = DebouncedSensor::from_pin(
            Arc::clone(&camera_id),
            engine_config.sensors.pins.get(&camera.name).copied(),
            engine_config.sensors.debounce(),
        );

        let ring_buffer = Arc::new(RingBuffer::new(engine_config.recording.pre_record()));

        // Enough room for the post-roll tail plus a second of writer stall
        let queue_capacity = (camera.framerate
            * (engine_config.recording.post_record_buffer + 1.0))
            .ceil()
            .max(32.0) as usize;

        let recording = RecordingEngine::new(
            Arc::clone(&camera_id),
            engine_config.recording.clone(),
            Arc::clone(&ring_buffer),
            writer,
            event_log,
            Arc::clone(&health),
            queue_capacity,
        );

        Self {
            camera_id,
            camera,
            source,
            ring_buffer,
            detector,
            coordinator,
            sensor,
            recording,
            health,
            cancel,
            stats: PipelineStats::default(),
        }
    }

    /// Snapshot of the camera's trigger state, for diagnostics
    pub fn trigger_state(&self) -> TriggerState {
        self.coordinator.state()
    }

    /// Run until cancelled. Per-frame failures never leave this loop; an
    /// in-progress clip is flushed before the source handle drops.
    pub async fn run(mut self) -> PipelineStats {
        info!(
            camera = %self.camera_id,
            framerate = self.camera.framerate,
            "Camera pipeline started"
        );
        self.health
            .set(&self.camera_id, CameraHealth::Running);

        let frame_interval = self.camera.frame_interval();
        let mut interval = tokio::time::interval(frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut active: Option<RecordingHandle> = None;
        let mut was_degraded = self.source.is_degraded();
        if was_degraded {
            self.health.set(
                &self.camera_id,
                CameraHealth::Degraded("using mock source".to_string()),
            );
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let tick_started = Instant::now();

            let frame = match self.source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    // Transient: the next tick retries in place
                    debug!(camera = %self.camera_id, error = %e, "Frame read failed, will retry");
                    continue;
                }
            };
            self.stats.frames_captured += 1;
            metrics::counter!("critterwatch_frames_captured_total").increment(1);

            if self.source.is_degraded() && !was_degraded {
                was_degraded = true;
                self.health.set(
                    &self.camera_id,
                    CameraHealth::Degraded("using mock source".to_string()),
                );
            }

            // Buffer and recording feeds run on every frame, unconditionally
            self.ring_buffer.push(frame.clone());
            if let Some(handle) = &active {
                handle.push_live(frame.clone());
            }

            // Soft real-time: past the frame budget, analysis is dropped,
            // never the frame itself
            let events = if tick_started.elapsed() < frame_interval {
                self.detector.analyze(&frame)
            } else {
                self.stats.analysis_skipped += 1;
                if self.stats.analysis_skipped % 100 == 1 {
                    warn!(
                        camera = %self.camera_id,
                        skipped = self.stats.analysis_skipped,
                        "Detector over frame budget, skipping analysis"
                    );
                }
                Vec::new()
            };

            let sensor_signal = self
                .sensor
                .as_mut()
                .and_then(|s| s.poll(frame.timestamp));

            // Reap a finished recording before stepping the coordinator so
            // its cooldown starts from the actual close
            if active.as_ref().is_some_and(|h| h.is_finished()) {
                if let Some(handle) = active.take() {
                    handle.join().await;
                }
                self.coordinator.clip_closed(Instant::now());
            }

            match self
                .coordinator
                .step(frame.timestamp, &events, sensor_signal.as_ref())
            {
                TriggerAction::Start(cmd) => {
                    self.stats.clips_started += 1;
                    let handle = self.recording.start(cmd, self.cancel.child_token());
                    active = Some(handle);
                }
                TriggerAction::Extend { at, area } => {
                    if let Some(handle) = &active {
                        handle.extend(at, area);
                    }
                }
                TriggerAction::None => {}
            }

            self.coordinator.tick(Instant::now());
        }

        // Shutdown: flush the in-progress clip before releasing the source
        if let Some(handle) = active.take() {
            info!(camera = %self.camera_id, "Flushing in-progress clip on shutdown");
            handle.join().await;
        }

        self.health.set(&self.camera_id, CameraHealth::Stopped);
        info!(
            camera = %self.camera_id,
            frames = self.stats.frames_captured,
            clips = self.stats.clips_started,
            "Camera pipeline stopped"
        );
        self.stats
    }
}
