// src/trigger/sensor.rs
//! External digital-sensor inputs
//!
//! An abstract digital-signal interface (GPIO or equivalent) feeding the
//! trigger coordinator. Signals are debounced here, before they ever reach
//! the coordinator; missing hardware support degrades to "no sensor input"
//! and leaves motion-only triggering untouched.

use crate::utils::errors::{EngineError, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A debounced external trigger pulse for one camera
#[derive(Debug, Clone)]
pub struct SensorSignal {
    pub camera_id: Arc<str>,
    pub timestamp: Instant,
}

/// Digital input line, high or low
pub trait DigitalSensor: Send {
    fn is_high(&mut self) -> Result<bool>;
}

/// Sysfs-backed GPIO input pin
pub struct GpioSensor {
    pin: u32,
    value_path: PathBuf,
}

impl GpioSensor {
    /// Open an exported GPIO pin. Fails when the sysfs entry is missing,
    /// which callers treat as "no sensor on this camera".
    pub fn open(pin: u32) -> Result<Self> {
        let value_path = PathBuf::from(format!("/sys/class/gpio/gpio{}/value", pin));
        if !value_path.exists() {
            return Err(EngineError::ConfigError(format!(
                "GPIO pin {} is not exported",
                pin
            )));
        }
        Ok(Self { pin, value_path })
    }
}

impl DigitalSensor for GpioSensor {
    fn is_high(&mut self) -> Result<bool> {
        let raw = std::fs::read_to_string(&self.value_path)
            .map_err(|e| EngineError::FrameRead(format!("GPIO pin {}: {}", self.pin, e)))?;
        Ok(raw.trim() == "1")
    }
}

/// Scripted sensor for tests: pops one level per poll, then stays low
pub struct MockSensor {
    levels: VecDeque<bool>,
}

impl MockSensor {
    pub fn new(levels: impl IntoIterator<Item = bool>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
        }
    }
}

impl DigitalSensor for MockSensor {
    fn is_high(&mut self) -> Result<bool> {
        Ok(self.levels.pop_front().unwrap_or(false))
    }
}

/// Rising-edge debouncer wrapping one camera's sensor
pub struct DebouncedSensor {
    camera_id: Arc<str>,
    sensor: Box<dyn DigitalSensor>,
    debounce: Duration,
    last_level: bool,
    last_signal: Option<Instant>,
}

impl DebouncedSensor {
    pub fn new(camera_id: Arc<str>, sensor: Box<dyn DigitalSensor>, debounce: Duration) -> Self {
        Self {
            camera_id,
            sensor,
            debounce,
            last_level: false,
            last_signal: None,
        }
    }

    /// Build the camera's sensor from configuration, if one is mapped.
    /// Hardware that cannot be opened degrades to no sensor.
    pub fn from_pin(camera_id: Arc<str>, pin: Option<u32>, debounce: Duration) -> Option<Self> {
        let pin = pin?;
        match GpioSensor::open(pin) {
            Ok(sensor) => {
                debug!(camera = %camera_id, pin, "Sensor input attached");
                Some(Self::new(camera_id, Box::new(sensor), debounce))
            }
            Err(e) => {
                warn!(camera = %camera_id, pin, error = %e, "Sensor unavailable, continuing without");
                None
            }
        }
    }

    /// Sample the line. Emits a signal on a rising edge, at most once per
    /// debounce window; sampling errors are treated as a low line.
    pub fn poll(&mut self, now: Instant) -> Option<SensorSignal> {
        let level = match self.sensor.is_high() {
            Ok(level) => level,
            Err(e) => {
                debug!(camera = %self.camera_id, error = %e, "Sensor read failed");
                false
            }
        };

        let rising = level && !self.last_level;
        self.last_level = level;

        if !rising {
            return None;
        }

        if let Some(last) = self.last_signal {
            if now.duration_since(last) < self.debounce {
                return None;
            }
        }

        self.last_signal = Some(now);
        Some(SensorSignal {
            camera_id: Arc::clone(&self.camera_id),
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debounced(levels: Vec<bool>, debounce_ms: u64) -> DebouncedSensor {
        DebouncedSensor::new(
            "cam".into(),
            Box::new(MockSensor::new(levels)),
            Duration::from_millis(debounce_ms),
        )
    }

    #[test]
    fn test_rising_edge_emits_signal() {
        let mut sensor = debounced(vec![false, true], 100);
        let base = Instant::now();

        assert!(sensor.poll(base).is_none());
        assert!(sensor.poll(base + Duration::from_millis(10)).is_some());
    }

    #[test]
    fn test_held_high_emits_once() {
        let mut sensor = debounced(vec![true, true, true], 100);
        let base = Instant::now();

        assert!(sensor.poll(base).is_some());
        assert!(sensor.poll(base + Duration::from_millis(10)).is_none());
        assert!(sensor.poll(base + Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_bounce_within_window_suppressed() {
        let mut sensor = debounced(vec![true, false, true], 100);
        let base = Instant::now();

        assert!(sensor.poll(base).is_some());
        assert!(sensor.poll(base + Duration::from_millis(20)).is_none());
        // Second rising edge 40ms after the first, inside the 100ms window
        assert!(sensor.poll(base + Duration::from_millis(40)).is_none());
    }

    #[test]
    fn test_edge_after_window_emits() {
        let mut sensor = debounced(vec![true, false, true], 100);
        let base = Instant::now();

        assert!(sensor.poll(base).is_some());
        assert!(sensor.poll(base + Duration::from_millis(50)).is_none());
        assert!(sensor.poll(base + Duration::from_millis(150)).is_some());
    }

    #[test]
    fn test_exhausted_script_reads_low() {
        let mut sensor = debounced(vec![], 100);
        assert!(sensor.poll(Instant::now()).is_none());
    }

    #[test]
    fn test_missing_gpio_pin_degrades_to_none() {
        // Pin 4_000_000 will never be exported
        let sensor = DebouncedSensor::from_pin("cam".into(), Some(4_000_000), Duration::ZERO);
        assert!(sensor.is_none());
    }
}
