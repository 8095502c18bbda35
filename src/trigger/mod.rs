// src/trigger/mod.rs
//! Trigger decisions
//!
//! - **Sensor**: abstract digital inputs, debounced before use
//! - **Coordinator**: per-camera trigger state machine with cooldown

pub mod coordinator;
pub mod sensor;

pub use coordinator::{
    StartRecording, TriggerAction, TriggerCoordinator, TriggerPhase, TriggerReason, TriggerState,
};
pub use sensor::{DebouncedSensor, DigitalSensor, GpioSensor, MockSensor, SensorSignal};
