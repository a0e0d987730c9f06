//! IO modules - hardware and collaborator interfaces
//!
//! This module contains everything that touches the outside world:
//! - `ranging` - Trigger/echo ranging driver with bounded waits
//! - `sim_sensor` - Simulated HC-SR04 lines and scripted doorway walker
//! - `reset_line` - Reset button edges (SIGUSR1 on Unix hosts)
//! - `display` - Status display collaborator
//! - `audio` - Audio playback collaborator

pub mod audio;
pub mod display;
pub mod ranging;
pub mod reset_line;
pub mod sim_sensor;

// Re-export commonly used types
pub use audio::{AudioPlayer, RecordingAudio, TracingAudio};
pub use display::{RecordingDisplay, StatusDisplay, TracingDisplay};
pub use ranging::{EchoLine, RangeSensor, RangeSensorConfig, Ranging, RangingError, TriggerLine};
pub use reset_line::ResetLine;
pub use sim_sensor::{simulated_sensor, SimTarget, SimulatedDoorway};
