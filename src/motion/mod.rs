// src/motion/mod.rs
//! Motion analysis
//!
//! - **Zones**: rectangular regions of interest per camera
//! - **Detector**: frame-differencing change measurement per zone
//!
//! The detector's cost must stay below the inter-frame interval; the
//! pipeline skips analysis ticks, never frames, when it overruns.

pub mod detector;
pub mod zone;

pub use detector::{MotionDetector, MotionEvent};
pub use zone::{Rect, Zone};
