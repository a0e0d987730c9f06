//! Crossing model - the decision the detector hands to the counting loop
//!
//! A `Crossing` is the detector's verdict (direction plus the two arm times it
//! was derived from). A `CrossingEvent` is that verdict after it has been
//! applied to the occupancy counter, carrying the outcome collaborators see.

use crate::domain::types::{Direction, OccupancySnapshot, Tick};

/// Audio file played for a counted entry
pub const AUDIO_WELCOME: u8 = 1;
/// Audio file played for a counted exit
pub const AUDIO_GOODBYE: u8 = 2;

/// Direction decision produced once both sensors are armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub direction: Direction,
    pub entry_armed_at: Tick,
    pub exit_armed_at: Tick,
    /// Both sensors armed on the same tick; direction came from the tie-break
    pub ambiguous: bool,
}

impl Crossing {
    /// Time between the first and second sensor arming
    pub fn arm_gap_ms(&self) -> u64 {
        self.entry_armed_at.0.abs_diff(self.exit_armed_at.0)
    }

    /// Tick at which the crossing became decidable
    pub fn decided_at(&self) -> Tick {
        self.entry_armed_at.max(self.exit_armed_at)
    }
}

/// What happened when a crossing was applied to the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingOutcome {
    Entered,
    Exited,
    /// Exit decided while the room was already empty; nothing was counted
    ExitRejected,
}

impl CrossingOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossingOutcome::Entered => "entered",
            CrossingOutcome::Exited => "exited",
            CrossingOutcome::ExitRejected => "exit_rejected_empty_room",
        }
    }

    /// Status line shown on the display
    pub fn message(&self) -> &'static str {
        match self {
            CrossingOutcome::Entered => "Person Entered",
            CrossingOutcome::Exited => "Person Exited",
            CrossingOutcome::ExitRejected => "No one inside!",
        }
    }

    /// Audio file to play, if any
    pub fn audio_file(&self) -> Option<u8> {
        match self {
            CrossingOutcome::Entered => Some(AUDIO_WELCOME),
            CrossingOutcome::Exited => Some(AUDIO_GOODBYE),
            CrossingOutcome::ExitRejected => None,
        }
    }
}

/// A crossing after it has been applied to the occupancy counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingEvent {
    pub crossing: Crossing,
    pub outcome: CrossingOutcome,
    /// Counter values after the crossing was applied
    pub occupancy: OccupancySnapshot,
}
