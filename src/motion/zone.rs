// src/motion/zone.rs
//! Motion zones
//!
//! A zone is a rectangular region of interest within a camera's frame.
//! Zones come from static configuration and never change after load.

use crate::utils::config::ZoneConfig;

/// Axis-aligned rectangle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Intersect with a frame of the given size. `None` when the rectangle
    /// lies entirely outside the frame or has zero area.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Rect> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }

        let width = self.width.min(frame_width - self.x);
        let height = self.height.min(frame_height - self.y);

        if width == 0 || height == 0 {
            return None;
        }

        Some(Rect {
            x: self.x,
            y: self.y,
            width,
            height,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A named detection region belonging to one camera
#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub enabled: bool,
    pub rect: Rect,
}

impl Zone {
    /// A zone spanning the whole frame, used when a camera configures none
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            name: "full".to_string(),
            enabled: true,
            rect: Rect {
                x: 0,
                y: 0,
                width,
                height,
            },
        }
    }
}

impl From<&ZoneConfig> for Zone {
    fn from(cfg: &ZoneConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            enabled: cfg.enabled,
            rect: Rect {
                x: cfg.x,
                y: cfg.y,
                width: cfg.width,
                height: cfg.height,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside_frame() {
        let rect = Rect {
            x: 10,
            y: 10,
            width: 20,
            height: 20,
        };
        assert_eq!(rect.clamp_to(640, 480), Some(rect));
    }

    #[test]
    fn test_clamp_overhanging_edge() {
        let rect = Rect {
            x: 630,
            y: 470,
            width: 20,
            height: 20,
        };
        let clamped = rect.clamp_to(640, 480).unwrap();
        assert_eq!(clamped.width, 10);
        assert_eq!(clamped.height, 10);
    }

    #[test]
    fn test_clamp_outside_frame() {
        let rect = Rect {
            x: 700,
            y: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(rect.clamp_to(640, 480), None);
    }

    #[test]
    fn test_zero_area_rect_rejected() {
        let rect = Rect {
            x: 0,
            y: 0,
            width: 0,
            height: 10,
        };
        assert_eq!(rect.clamp_to(640, 480), None);
    }

    #[test]
    fn test_full_frame_zone() {
        let zone = Zone::full_frame(640, 480);
        assert!(zone.enabled);
        assert_eq!(zone.rect.area(), 640 * 480);
    }
}
