//! Shared types for the door counter

use serde::Deserialize;
use std::time::Instant;

/// Milliseconds since boot on the loop's monotonic clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Tick(pub u64);

impl Tick {
    /// Milliseconds elapsed from `earlier` to `self`, zero if `earlier` is later
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Which of the two doorway sensors a reading belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSide {
    Entry,
    Exit,
}

impl SensorSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorSide::Entry => "entry",
            SensorSide::Exit => "exit",
        }
    }
}

/// Direction of a completed crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }
}

/// Result of one ranging cycle on a single sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Centimeters(u16),
    /// No echo within the wait budget; treated as "nothing in range"
    Timeout,
}

impl Distance {
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Distance::Timeout)
    }

    /// True when a real reading lies strictly below `threshold_cm`
    #[inline]
    pub fn is_below(&self, threshold_cm: u16) -> bool {
        match self {
            Distance::Centimeters(cm) => *cm < threshold_cm,
            Distance::Timeout => false,
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Centimeters(cm) => write!(f, "{cm}cm"),
            Distance::Timeout => f.write_str("timeout"),
        }
    }
}

/// A distance reading stamped with the tick it was taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub distance: Distance,
    pub timestamp: Tick,
}

impl Sample {
    pub fn new(distance: Distance, timestamp: Tick) -> Self {
        Self { distance, timestamp }
    }

    pub fn timeout(timestamp: Tick) -> Self {
        Self { distance: Distance::Timeout, timestamp }
    }
}

/// Boolean "object present" observation fed to the crossing detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub present: bool,
    pub at: Tick,
}

impl Presence {
    pub fn present(at: Tick) -> Self {
        Self { present: true, at }
    }

    pub fn clear(at: Tick) -> Self {
        Self { present: false, at }
    }

    /// Threshold a sample into a presence observation
    pub fn from_sample(sample: &Sample, threshold_cm: u16) -> Self {
        Self { present: sample.distance.is_below(threshold_cm), at: sample.timestamp }
    }
}

/// Counter values handed to collaborators after every change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OccupancySnapshot {
    pub entries: u64,
    pub exits: u64,
    pub current: u64,
}

/// One edge on the reset input line
#[derive(Debug, Clone, Copy)]
pub struct ResetEdge {
    pub at: Instant,
}

impl ResetEdge {
    pub fn now() -> Self {
        Self { at: Instant::now() }
    }
}
