//! Crossing-direction detector
//!
//! Turns two polled presence streams into at most one directional crossing.
//!
//! Each sensor carries an arm state: the tick at which it first saw an object,
//! or nothing. The detector state is derived from the two arm states alone:
//!
//! - `Idle` - neither sensor armed
//! - `EntryArmed` / `ExitArmed` - one sensor armed, waiting for the other
//! - `BothArmedEntryOrder` / `BothArmedExitOrder` - both armed; the earlier
//!   `armed_at` decides the direction
//!
//! A both-armed state is resolved in the same `observe` call that reached it,
//! so callers only ever see `Idle` or a single armed sensor between cycles.
//!
//! Key behaviors:
//! - Direction comes from arming time, not sampling time. A sensor that stays
//!   covered for several cycles keeps the `armed_at` of its first sample.
//! - Equal arming ticks are ambiguous and resolved by the configured tie-break
//! - A lone arm older than the grace window is dropped without an event
//! - A consumed sensor (crossing, expiry, reset) does not re-arm until it has
//!   reported clear, so someone still standing in a beam cannot pair with the
//!   next visitor
//! - After a reset that caught someone in the doorway, nothing arms until one
//!   cycle sees both beams clear

use crate::domain::crossing::Crossing;
use crate::domain::types::{Direction, Presence, SensorSide, Tick};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Longest a single sensor may stay armed waiting for the other
    pub grace_ms: u64,
    /// Consecutive present samples needed before a sensor arms
    pub confirm_samples: u32,
    /// Direction used when both sensors arm on the same tick
    pub tie_break: Direction,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { grace_ms: 3000, confirm_samples: 1, tie_break: Direction::Entry }
    }
}

/// Per-sensor arm state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorArmState {
    armed_at: Option<Tick>,
}

impl SensorArmState {
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    #[inline]
    pub fn armed_at(&self) -> Option<Tick> {
        self.armed_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    EntryArmed,
    ExitArmed,
    BothArmedEntryOrder,
    BothArmedExitOrder,
}

impl DetectorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorState::Idle => "idle",
            DetectorState::EntryArmed => "entry_armed",
            DetectorState::ExitArmed => "exit_armed",
            DetectorState::BothArmedEntryOrder => "both_armed_entry_order",
            DetectorState::BothArmedExitOrder => "both_armed_exit_order",
        }
    }
}

/// What one `observe` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectorStep {
    pub crossing: Option<Crossing>,
    pub entry_expired: bool,
    pub exit_expired: bool,
}

impl DetectorStep {
    pub fn expired_count(&self) -> u64 {
        u64::from(self.entry_expired) + u64::from(self.exit_expired)
    }
}

/// Arm state plus the debounce bookkeeping behind it
#[derive(Debug, Clone, Copy, Default)]
struct SensorTrack {
    arm: SensorArmState,
    /// Consecutive present samples in the current run
    run_len: u32,
    run_started: Option<Tick>,
    /// Last observation was "present"
    present: bool,
    /// Consumed while covered; ignore presence until the beam clears
    awaiting_clear: bool,
}

impl SensorTrack {
    /// Feed one observation; returns true if the sensor armed on it
    fn observe(&mut self, presence: Presence, confirm_samples: u32) -> bool {
        self.present = presence.present;
        if !presence.present {
            self.run_len = 0;
            self.run_started = None;
            self.awaiting_clear = false;
            return false;
        }
        if self.arm.is_armed() || self.awaiting_clear {
            return false;
        }

        if self.run_len == 0 {
            self.run_started = Some(presence.at);
        }
        self.run_len = self.run_len.saturating_add(1);

        if self.run_len >= confirm_samples {
            self.arm.armed_at = self.run_started;
            return true;
        }
        false
    }

    /// Track presence without starting a run
    fn hold(&mut self, presence: Presence) {
        self.present = presence.present;
        self.run_len = 0;
        self.run_started = None;
    }

    /// Drop the arm and any partial run
    fn consume(&mut self) {
        self.arm = SensorArmState::default();
        self.run_len = 0;
        self.run_started = None;
        self.awaiting_clear = self.present;
    }
}

pub struct CrossingDetector {
    config: DetectorConfig,
    entry: SensorTrack,
    exit: SensorTrack,
    /// Set by `force_idle` while someone was in the doorway; no sensor arms
    /// until a cycle sees both beams clear
    settling: bool,
}

impl CrossingDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            entry: SensorTrack::default(),
            exit: SensorTrack::default(),
            settling: false,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn arm_state(&self, side: SensorSide) -> SensorArmState {
        match side {
            SensorSide::Entry => self.entry.arm,
            SensorSide::Exit => self.exit.arm,
        }
    }

    /// Current state, derived from the two arm states
    pub fn state(&self) -> DetectorState {
        match (self.entry.arm.armed_at, self.exit.arm.armed_at) {
            (None, None) => DetectorState::Idle,
            (Some(_), None) => DetectorState::EntryArmed,
            (None, Some(_)) => DetectorState::ExitArmed,
            (Some(entry_at), Some(exit_at)) => match entry_at.cmp(&exit_at) {
                Ordering::Less => DetectorState::BothArmedEntryOrder,
                Ordering::Greater => DetectorState::BothArmedExitOrder,
                Ordering::Equal => match self.config.tie_break {
                    Direction::Entry => DetectorState::BothArmedEntryOrder,
                    Direction::Exit => DetectorState::BothArmedExitOrder,
                },
            },
        }
    }

    /// Process one polling cycle's pair of observations
    pub fn observe(&mut self, entry: Presence, exit: Presence) -> DetectorStep {
        let now = entry.at.max(exit.at);
        let mut step = DetectorStep {
            entry_expired: self.expire_lone_arm(SensorSide::Entry, now),
            exit_expired: self.expire_lone_arm(SensorSide::Exit, now),
            crossing: None,
        };

        if self.settling {
            if entry.present || exit.present {
                self.entry.hold(entry);
                self.exit.hold(exit);
                return step;
            }
            self.settling = false;
            debug!(at = %now, "doorway_settled");
        }

        let confirm = self.config.confirm_samples;
        if self.entry.observe(entry, confirm) {
            debug!(sensor = "entry", armed_at = ?self.entry.arm.armed_at, "sensor_armed");
        }
        if self.exit.observe(exit, confirm) {
            debug!(sensor = "exit", armed_at = ?self.exit.arm.armed_at, "sensor_armed");
        }

        let direction = match self.state() {
            DetectorState::BothArmedEntryOrder => Direction::Entry,
            DetectorState::BothArmedExitOrder => Direction::Exit,
            DetectorState::Idle | DetectorState::EntryArmed | DetectorState::ExitArmed => {
                return step;
            }
        };

        // Both armed: state() only reports a both-armed variant when both are set
        let (Some(entry_armed_at), Some(exit_armed_at)) =
            (self.entry.arm.armed_at, self.exit.arm.armed_at)
        else {
            return step;
        };

        let crossing = Crossing {
            direction,
            entry_armed_at,
            exit_armed_at,
            ambiguous: entry_armed_at == exit_armed_at,
        };

        if crossing.ambiguous {
            warn!(
                armed_at = %entry_armed_at,
                tie_break = %direction.as_str(),
                "crossing_ambiguous"
            );
        }
        debug!(
            direction = %direction.as_str(),
            entry_armed_at = %entry_armed_at,
            exit_armed_at = %exit_armed_at,
            gap_ms = %crossing.arm_gap_ms(),
            "crossing_decided"
        );

        self.entry.consume();
        self.exit.consume();
        step.crossing = Some(crossing);
        step
    }

    /// Unarm both sensors; returns true if either was armed
    ///
    /// If anyone was in the doorway, arming stays blocked until both beams
    /// read clear in one cycle, so the rest of an interrupted walk cannot
    /// leave an arm behind for the next visitor.
    pub fn force_idle(&mut self) -> bool {
        let was_armed = self.entry.arm.is_armed() || self.exit.arm.is_armed();
        if was_armed || self.entry.present || self.exit.present {
            self.settling = true;
        }
        self.entry.consume();
        self.exit.consume();
        was_armed
    }

    /// Arming is blocked until the doorway reads clear
    pub fn is_settling(&self) -> bool {
        self.settling
    }

    /// Drop `side`'s arm if it has waited alone past the grace window
    fn expire_lone_arm(&mut self, side: SensorSide, now: Tick) -> bool {
        let (track, other) = match side {
            SensorSide::Entry => (&mut self.entry, &self.exit),
            SensorSide::Exit => (&mut self.exit, &self.entry),
        };
        let Some(armed_at) = track.arm.armed_at else {
            return false;
        };
        if other.arm.is_armed() {
            return false;
        }

        let waited_ms = now.since(armed_at);
        if waited_ms <= self.config.grace_ms {
            return false;
        }

        info!(
            sensor = %side.as_str(),
            armed_at = %armed_at,
            waited_ms = %waited_ms,
            "arm_expired"
        );
        track.consume();
        true
    }
}
