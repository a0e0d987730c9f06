//! Services - business logic and state management
//!
//! This module contains the core counting logic:
//! - `crossing_detector` - Two-sensor arm/decide state machine
//! - `occupancy` - Entry/exit/current counters
//! - `door` - Detector and counters behind one lock, with the reset epoch
//! - `counter_loop` - Periodic sampling loop and collaborator notifications
//! - `reset` - Debounced reset handler

pub mod counter_loop;
pub mod crossing_detector;
pub mod door;
pub mod occupancy;
pub mod reset;

// Re-export commonly used types
pub use counter_loop::CounterLoop;
pub use crossing_detector::{CrossingDetector, DetectorConfig, DetectorState, DetectorStep};
pub use door::{CycleOutcome, DoorCounter, ResetReport};
pub use occupancy::{ExitResult, OccupancyCounter};
pub use reset::ResetHandler;
