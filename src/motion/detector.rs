// src/motion/detector.rs
//! Per-camera motion detection
//!
//! Compares each frame against its predecessor over every enabled zone and
//! counts pixels whose absolute delta exceeds the sensitivity-derived
//! threshold. Detection runs on every frame regardless of trigger phase;
//! motion timing during a recording is what extends its post-roll.

use crate::capture::frame::Frame;
use crate::motion::zone::Zone;
use crate::utils::config::MotionConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// A detected change in one zone for one frame pair
#[derive(Debug, Clone)]
pub struct MotionEvent {
    pub camera_id: Arc<str>,
    pub zone: String,
    pub timestamp: Instant,
    pub changed_pixels: u32,

    /// Whether the changed area meets the configured minimum
    pub qualifies: bool,
}

/// Maps sensitivity in [0, 1] to a pixel-delta threshold. Higher sensitivity
/// means a lower threshold, so more deltas count as change.
fn delta_threshold(sensitivity: f64) -> u8 {
    let threshold = 255.0 - sensitivity.clamp(0.0, 1.0) * 230.0;
    threshold.clamp(10.0, 255.0) as u8
}

/// Frame-differencing detector for one camera
pub struct MotionDetector {
    camera_id: Arc<str>,
    zones: Vec<Zone>,
    threshold: u8,
    min_area: u32,
    previous: Option<Frame>,
}

impl MotionDetector {
    /// Build a detector. An empty zone list falls back to one full-frame
    /// zone so the camera is never blind.
    pub fn new(
        camera_id: Arc<str>,
        mut zones: Vec<Zone>,
        frame_width: u32,
        frame_height: u32,
        config: &MotionConfig,
    ) -> Self {
        if zones.is_empty() {
            zones.push(Zone::full_frame(frame_width, frame_height));
        }

        let threshold = delta_threshold(config.sensitivity);
        debug!(
            camera = %camera_id,
            threshold,
            min_area = config.min_area,
            zones = zones.len(),
            "Motion detector initialized"
        );

        Self {
            camera_id,
            zones,
            threshold,
            min_area: config.min_area,
            previous: None,
        }
    }

    /// Analyze one frame against the previous one. Emits at most one event
    /// per enabled zone. The first frame of a stream produces nothing; a
    /// frame with different dimensions or a malformed payload resets the
    /// baseline.
    pub fn analyze(&mut self, frame: &Frame) -> Vec<MotionEvent> {
        if !frame.is_well_formed() {
            debug!(
                camera = %self.camera_id,
                payload = frame.data.len(),
                "Frame payload does not match its dimensions, skipping"
            );
            self.previous = None;
            return Vec::new();
        }

        let Some(previous) = self.previous.take() else {
            self.previous = Some(frame.clone());
            return Vec::new();
        };

        if previous.width != frame.width || previous.height != frame.height {
            debug!(camera = %self.camera_id, "Frame dimensions changed, resetting baseline");
            self.previous = Some(frame.clone());
            return Vec::new();
        }

        let mut events = Vec::new();

        for zone in self.zones.iter().filter(|z| z.enabled) {
            let Some(rect) = zone.rect.clamp_to(frame.width, frame.height) else {
                continue;
            };

            let mut changed: u32 = 0;
            for y in rect.y..rect.y + rect.height {
                let row = (y * frame.width) as usize;
                let prev_row = &previous.data[row + rect.x as usize..row + (rect.x + rect.width) as usize];
                let curr_row = &frame.data[row + rect.x as usize..row + (rect.x + rect.width) as usize];

                for (prev_px, curr_px) in prev_row.iter().zip(curr_row.iter()) {
                    if prev_px.abs_diff(*curr_px) >= self.threshold {
                        changed += 1;
                    }
                }
            }

            if changed > 0 {
                let qualifies = changed >= self.min_area;
                trace!(
                    camera = %self.camera_id,
                    zone = %zone.name,
                    changed_pixels = changed,
                    qualifies,
                    "Zone change measured"
                );
                metrics::counter!("critterwatch_motion_events_total").increment(1);

                events.push(MotionEvent {
                    camera_id: Arc::clone(&self.camera_id),
                    zone: zone.name.clone(),
                    timestamp: frame.timestamp,
                    changed_pixels: changed,
                    qualifies,
                });
            }
        }

        self.previous = Some(frame.clone());
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::zone::Rect;
    use bytes::Bytes;

    fn config(sensitivity: f64, min_area: u32) -> MotionConfig {
        MotionConfig {
            sensitivity,
            min_area,
            cooldown_period: 10.0,
        }
    }

    fn flat_frame(seq: u64, width: u32, height: u32, value: u8) -> Frame {
        Frame::new(
            "cam".into(),
            seq,
            width,
            height,
            Bytes::from(vec![value; (width * height) as usize]),
        )
    }

    /// Frame with a `pixels`-sized block of bright pixels at the origin
    fn frame_with_blob(seq: u64, width: u32, height: u32, pixels: u32) -> Frame {
        let mut data = vec![16u8; (width * height) as usize];
        for i in 0..pixels as usize {
            data[i] = 240;
        }
        Frame::new("cam".into(), seq, width, height, Bytes::from(data))
    }

    #[test]
    fn test_first_frame_emits_nothing() {
        let mut detector = MotionDetector::new("cam".into(), vec![], 32, 32, &config(0.5, 100));
        let events = detector.analyze(&flat_frame(0, 32, 32, 16));
        assert!(events.is_empty());
    }

    #[test]
    fn test_no_change_no_event() {
        let mut detector = MotionDetector::new("cam".into(), vec![], 32, 32, &config(0.5, 100));
        detector.analyze(&flat_frame(0, 32, 32, 16));
        let events = detector.analyze(&flat_frame(1, 32, 32, 16));
        assert!(events.is_empty());
    }

    #[test]
    fn test_area_at_min_qualifies_below_does_not() {
        // 800 changed pixels with min_area 500 qualifies
        let mut detector = MotionDetector::new("cam".into(), vec![], 64, 64, &config(0.5, 500));
        detector.analyze(&flat_frame(0, 64, 64, 16));
        let events = detector.analyze(&frame_with_blob(1, 64, 64, 800));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].changed_pixels, 800);
        assert!(events[0].qualifies);

        // 400 changed pixels does not
        let mut detector = MotionDetector::new("cam".into(), vec![], 64, 64, &config(0.5, 500));
        detector.analyze(&flat_frame(0, 64, 64, 16));
        let events = detector.analyze(&frame_with_blob(1, 64, 64, 400));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].changed_pixels, 400);
        assert!(!events[0].qualifies);
    }

    #[test]
    fn test_detection_restricted_to_zone() {
        let zone = Zone {
            name: "corner".to_string(),
            enabled: true,
            rect: Rect {
                x: 16,
                y: 16,
                width: 16,
                height: 16,
            },
        };
        let mut detector =
            MotionDetector::new("cam".into(), vec![zone], 32, 32, &config(0.5, 1));

        detector.analyze(&flat_frame(0, 32, 32, 16));
        // Blob at the origin, outside the zone
        let events = detector.analyze(&frame_with_blob(1, 32, 32, 64));
        assert!(events.is_empty());
    }

    #[test]
    fn test_disabled_zone_skipped() {
        let zone = Zone {
            name: "off".to_string(),
            enabled: false,
            rect: Rect {
                x: 0,
                y: 0,
                width: 32,
                height: 32,
            },
        };
        let mut detector =
            MotionDetector::new("cam".into(), vec![zone], 32, 32, &config(0.5, 1));

        detector.analyze(&flat_frame(0, 32, 32, 16));
        let events = detector.analyze(&frame_with_blob(1, 32, 32, 64));
        assert!(events.is_empty());
    }

    #[test]
    fn test_dimension_change_resets_baseline() {
        let mut detector = MotionDetector::new("cam".into(), vec![], 32, 32, &config(0.5, 1));
        detector.analyze(&flat_frame(0, 32, 32, 16));
        assert!(detector.analyze(&flat_frame(1, 16, 16, 240)).is_empty());
        // Next comparable pair works again
        assert!(!detector.analyze(&flat_frame(2, 16, 16, 16)).is_empty());
    }

    #[test]
    fn test_malformed_frame_skipped_without_panic() {
        let mut detector = MotionDetector::new("cam".into(), vec![], 32, 32, &config(0.5, 1));
        detector.analyze(&flat_frame(0, 32, 32, 16));

        // Payload shorter than width * height must not be diffed
        let short = Frame::new("cam".into(), 1, 32, 32, Bytes::from(vec![16u8; 100]));
        assert!(detector.analyze(&short).is_empty());

        // Baseline was dropped: the next good frame re-seeds, the pair after
        // that is comparable again
        assert!(detector.analyze(&flat_frame(2, 32, 32, 16)).is_empty());
        assert!(!detector.analyze(&frame_with_blob(3, 32, 32, 64)).is_empty());
    }

    #[test]
    fn test_higher_sensitivity_lowers_threshold() {
        assert!(delta_threshold(0.9) < delta_threshold(0.1));
        assert!(delta_threshold(1.0) >= 10);
        assert_eq!(delta_threshold(0.0), 255);
    }

    #[test]
    fn test_detection_continues_after_event() {
        // Stateless across trigger phases: every frame pair is evaluated
        let mut detector = MotionDetector::new("cam".into(), vec![], 32, 32, &config(0.5, 1));
        detector.analyze(&flat_frame(0, 32, 32, 16));
        assert!(!detector.analyze(&frame_with_blob(1, 32, 32, 64)).is_empty());
        assert!(!detector.analyze(&flat_frame(2, 32, 32, 16)).is_empty());
        assert!(detector.analyze(&flat_frame(3, 32, 32, 16)).is_empty());
    }
}
