// src/trigger/coordinator.rs
//! Trigger state machine
//!
//! Fuses qualifying motion events and debounced sensor signals into per-camera
//! trigger decisions. One coordinator exists per camera and owns that camera's
//! `TriggerState` exclusively; transitions are total and deterministic for a
//! given event sequence.
//!
//! Phases: `Idle -> Recording -> Cooldown -> Idle`. While recording, further
//! qualifying events only extend the post-roll. During cooldown every event is
//! observed but ignored for triggering until `cooldown_period` has elapsed
//! since the last trigger.
//!
//! Tie-break when several candidates arrive in one step: earliest timestamp
//! wins, motion before sensor on exact ties.

use crate::motion::detector::MotionEvent;
use crate::trigger::sensor::SensorSignal;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Why a recording started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerReason {
    Motion,
    Sensor,
    Test,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::Motion => "motion",
            TriggerReason::Sensor => "sensor",
            TriggerReason::Test => "test",
        }
    }
}

/// Trigger phase for one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPhase {
    Idle,
    Recording,
    Cooldown,
}

/// Snapshot of a camera's trigger state, for diagnostics
#[derive(Debug, Clone, Copy)]
pub struct TriggerState {
    pub phase: TriggerPhase,
    pub last_trigger: Option<Instant>,
    pub last_motion: Option<Instant>,
}

/// Command to the recording engine
#[derive(Debug, Clone, Copy)]
pub struct StartRecording {
    pub reason: TriggerReason,
    pub at: Instant,

    /// Peak changed-pixel area among the triggering candidates
    pub peak_area: u32,
}

/// Outcome of one coordinator step
#[derive(Debug, Clone, Copy)]
pub enum TriggerAction {
    /// Nothing to do
    None,

    /// Begin a new clip
    Start(StartRecording),

    /// A recording is active; refresh its post-roll deadline
    Extend { at: Instant, area: u32 },
}

/// One trigger candidate within a step, in tie-break order
#[derive(Debug, Clone, Copy)]
enum Candidate {
    Motion { at: Instant, area: u32 },
    Sensor { at: Instant },
}

impl Candidate {
    fn at(&self) -> Instant {
        match self {
            Candidate::Motion { at, .. } | Candidate::Sensor { at } => *at,
        }
    }

    /// Motion sorts before sensor on equal timestamps
    fn rank(&self) -> u8 {
        match self {
            Candidate::Motion { .. } => 0,
            Candidate::Sensor { .. } => 1,
        }
    }
}

/// Per-camera trigger coordinator
pub struct TriggerCoordinator {
    camera_id: Arc<str>,
    cooldown: Duration,
    phase: TriggerPhase,
    last_trigger: Option<Instant>,
    last_motion: Option<Instant>,
}

impl TriggerCoordinator {
    pub fn new(camera_id: Arc<str>, cooldown: Duration) -> Self {
        Self {
            camera_id,
            cooldown,
            phase: TriggerPhase::Idle,
            last_trigger: None,
            last_motion: None,
        }
    }

    /// Process one frame's worth of events. Candidates are evaluated in a
    /// total order: timestamp ascending, motion before sensor on ties.
    pub fn step(
        &mut self,
        now: Instant,
        motion: &[MotionEvent],
        sensor: Option<&SensorSignal>,
    ) -> TriggerAction {
        self.advance_cooldown(now);

        let mut candidates: Vec<Candidate> = motion
            .iter()
            .filter(|e| e.qualifies)
            .map(|e| Candidate::Motion {
                at: e.timestamp,
                area: e.changed_pixels,
            })
            .collect();
        if let Some(signal) = sensor {
            candidates.push(Candidate::Sensor {
                at: signal.timestamp,
            });
        }

        if candidates.is_empty() {
            return TriggerAction::None;
        }

        candidates.sort_by_key(|c| (c.at(), c.rank()));

        // Any qualifying activity refreshes last_motion, whatever the phase
        let latest = candidates.iter().map(Candidate::at).max().unwrap_or(now);
        self.last_motion = Some(self.last_motion.map_or(latest, |m| m.max(latest)));
        let peak_area = candidates
            .iter()
            .filter_map(|c| match c {
                Candidate::Motion { area, .. } => Some(*area),
                Candidate::Sensor { .. } => None,
            })
            .max()
            .unwrap_or(0);

        match self.phase {
            TriggerPhase::Idle => {
                let first = candidates[0];
                let reason = match first {
                    Candidate::Motion { .. } => TriggerReason::Motion,
                    Candidate::Sensor { .. } => TriggerReason::Sensor,
                };
                self.begin_recording(first.at(), reason);
                TriggerAction::Start(StartRecording {
                    reason,
                    at: first.at(),
                    peak_area,
                })
            }
            TriggerPhase::Recording => TriggerAction::Extend {
                at: latest,
                area: peak_area,
            },
            TriggerPhase::Cooldown => {
                debug!(camera = %self.camera_id, "Event ignored during cooldown");
                TriggerAction::None
            }
        }
    }

    /// Manually start a test recording. Only honored while idle.
    pub fn force_trigger(&mut self, now: Instant) -> Option<StartRecording> {
        self.advance_cooldown(now);
        if self.phase != TriggerPhase::Idle {
            return None;
        }
        self.begin_recording(now, TriggerReason::Test);
        Some(StartRecording {
            reason: TriggerReason::Test,
            at: now,
            peak_area: 0,
        })
    }

    /// The recording engine reports the clip closed; enter cooldown.
    pub fn clip_closed(&mut self, now: Instant) {
        debug_assert_eq!(self.phase, TriggerPhase::Recording);
        self.phase = TriggerPhase::Cooldown;
        debug!(camera = %self.camera_id, "Clip closed, entering cooldown");
        self.advance_cooldown(now);
    }

    /// Advance a lapsed cooldown. Called on every step and poll tick so the
    /// transition does not depend on event arrival.
    pub fn tick(&mut self, now: Instant) {
        self.advance_cooldown(now);
    }

    pub fn phase(&self) -> TriggerPhase {
        self.phase
    }

    /// Snapshot-consistent view of the camera's trigger state
    pub fn state(&self) -> TriggerState {
        TriggerState {
            phase: self.phase,
            last_trigger: self.last_trigger,
            last_motion: self.last_motion,
        }
    }

    fn begin_recording(&mut self, at: Instant, reason: TriggerReason) {
        self.phase = TriggerPhase::Recording;
        self.last_trigger = Some(at);
        self.last_motion = Some(at);
        info!(
            camera = %self.camera_id,
            reason = reason.as_str(),
            "Trigger fired, starting recording"
        );
        metrics::counter!("critterwatch_triggers_total").increment(1);
    }

    fn advance_cooldown(&mut self, now: Instant) {
        if self.phase != TriggerPhase::Cooldown {
            return;
        }
        let expired = match self.last_trigger {
            Some(t) => now.duration_since(t) >= self.cooldown,
            None => true,
        };
        if expired {
            debug!(camera = %self.camera_id, "Cooldown elapsed, idle");
            self.phase = TriggerPhase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion_event(at: Instant, area: u32, qualifies: bool) -> MotionEvent {
        MotionEvent {
            camera_id: Arc::from("cam"),
            zone: "main".to_string(),
            timestamp: at,
            changed_pixels: area,
            qualifies,
        }
    }

    fn coordinator(cooldown_secs: u64) -> TriggerCoordinator {
        TriggerCoordinator::new("cam".into(), Duration::from_secs(cooldown_secs))
    }

    #[test]
    fn test_idle_qualifying_motion_starts_recording() {
        let mut coord = coordinator(10);
        let now = Instant::now();

        let action = coord.step(now, &[motion_event(now, 800, true)], None);
        match action {
            TriggerAction::Start(cmd) => {
                assert_eq!(cmd.reason, TriggerReason::Motion);
                assert_eq!(cmd.peak_area, 800);
            }
            other => panic!("expected Start, got {:?}", other),
        }
        assert_eq!(coord.phase(), TriggerPhase::Recording);
    }

    #[test]
    fn test_non_qualifying_motion_ignored() {
        let mut coord = coordinator(10);
        let now = Instant::now();

        let action = coord.step(now, &[motion_event(now, 100, false)], None);
        assert!(matches!(action, TriggerAction::None));
        assert_eq!(coord.phase(), TriggerPhase::Idle);
    }

    #[test]
    fn test_motion_while_recording_extends() {
        let mut coord = coordinator(10);
        let t0 = Instant::now();
        coord.step(t0, &[motion_event(t0, 800, true)], None);

        let t1 = t0 + Duration::from_secs(1);
        let action = coord.step(t1, &[motion_event(t1, 900, true)], None);
        match action {
            TriggerAction::Extend { at, area } => {
                assert_eq!(at, t1);
                assert_eq!(area, 900);
            }
            other => panic!("expected Extend, got {:?}", other),
        }
        assert_eq!(coord.phase(), TriggerPhase::Recording);
        assert_eq!(coord.state().last_motion, Some(t1));
    }

    #[test]
    fn test_clip_closed_enters_cooldown_then_idle() {
        let mut coord = coordinator(10);
        let t0 = Instant::now();
        coord.step(t0, &[motion_event(t0, 800, true)], None);

        coord.clip_closed(t0 + Duration::from_secs(5));
        assert_eq!(coord.phase(), TriggerPhase::Cooldown);

        // Events during cooldown are observed but do not trigger
        let t1 = t0 + Duration::from_secs(7);
        let action = coord.step(t1, &[motion_event(t1, 800, true)], None);
        assert!(matches!(action, TriggerAction::None));

        // Cooldown measured from the trigger time, not clip close
        coord.tick(t0 + Duration::from_secs(10));
        assert_eq!(coord.phase(), TriggerPhase::Idle);
    }

    #[test]
    fn test_event_at_cooldown_expiry_triggers() {
        let mut coord = coordinator(10);
        let t0 = Instant::now();
        coord.step(t0, &[motion_event(t0, 800, true)], None);
        coord.clip_closed(t0 + Duration::from_secs(5));

        let t1 = t0 + Duration::from_secs(10);
        let action = coord.step(t1, &[motion_event(t1, 800, true)], None);
        assert!(matches!(action, TriggerAction::Start(_)));
    }

    #[test]
    fn test_sensor_triggers_from_idle() {
        let mut coord = coordinator(10);
        let now = Instant::now();
        let signal = SensorSignal {
            camera_id: Arc::from("cam"),
            timestamp: now,
        };

        let action = coord.step(now, &[], Some(&signal));
        match action {
            TriggerAction::Start(cmd) => assert_eq!(cmd.reason, TriggerReason::Sensor),
            other => panic!("expected Start, got {:?}", other),
        }
    }

    #[test]
    fn test_tie_break_motion_before_sensor() {
        let mut coord = coordinator(10);
        let now = Instant::now();
        let signal = SensorSignal {
            camera_id: Arc::from("cam"),
            timestamp: now,
        };

        let action = coord.step(now, &[motion_event(now, 800, true)], Some(&signal));
        match action {
            TriggerAction::Start(cmd) => assert_eq!(cmd.reason, TriggerReason::Motion),
            other => panic!("expected Start, got {:?}", other),
        }
    }

    #[test]
    fn test_earliest_timestamp_wins() {
        let mut coord = coordinator(10);
        let t0 = Instant::now();
        let signal = SensorSignal {
            camera_id: Arc::from("cam"),
            timestamp: t0,
        };
        // Motion arrived later than the sensor pulse
        let late_motion = motion_event(t0 + Duration::from_millis(50), 800, true);

        let action = coord.step(t0 + Duration::from_millis(60), &[late_motion], Some(&signal));
        match action {
            TriggerAction::Start(cmd) => assert_eq!(cmd.reason, TriggerReason::Sensor),
            other => panic!("expected Start, got {:?}", other),
        }
    }

    #[test]
    fn test_force_trigger_only_when_idle() {
        let mut coord = coordinator(10);
        let now = Instant::now();

        let cmd = coord.force_trigger(now).unwrap();
        assert_eq!(cmd.reason, TriggerReason::Test);
        assert!(coord.force_trigger(now + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_deterministic_for_fixed_sequence() {
        // Same event sequence on two coordinators yields identical phases
        let t0 = Instant::now();
        let steps: Vec<(Duration, u32)> = vec![
            (Duration::from_secs(0), 800),
            (Duration::from_secs(1), 600),
            (Duration::from_secs(12), 700),
        ];

        let run = |coord: &mut TriggerCoordinator| {
            let mut phases = Vec::new();
            for (offset, area) in &steps {
                let at = t0 + *offset;
                coord.step(at, &[motion_event(at, *area, true)], None);
                phases.push(coord.phase());
            }
            phases
        };

        let mut a = coordinator(10);
        let mut b = coordinator(10);
        assert_eq!(run(&mut a), run(&mut b));
    }
}
