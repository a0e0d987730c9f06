//! Domain models - core counting types
//!
//! This module contains the canonical data types used throughout the system:
//! - `Sample` / `Distance` - one ranging result and its timestamp
//! - `Presence` - thresholded "object present" observation
//! - `Crossing` - a direction decision made by the detector
//! - `CrossingEvent` - a decision after it was applied to the counter
//! - `ResetEdge` - one press of the reset button

pub mod crossing;
pub mod types;

pub use crossing::{Crossing, CrossingEvent, CrossingOutcome};
pub use types::{
    Direction, Distance, OccupancySnapshot, Presence, ResetEdge, Sample, SensorSide, Tick,
};
