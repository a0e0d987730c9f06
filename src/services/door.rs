//! Door state shared by the polling loop and the reset path
//!
//! The detector and the occupancy counter live behind one lock. A polling
//! cycle applies its observation under that lock, and a reset clears both
//! under the same lock, so a crossing can never be half-applied around a
//! reset.
//!
//! Ranging happens outside the lock (it takes tens of milliseconds). To keep a
//! reset from being undone by a cycle whose samples were taken before it, each
//! reset bumps an epoch; the loop reads the epoch before ranging and the
//! observation is discarded if the epoch moved in between.

use crate::domain::crossing::{Crossing, CrossingEvent, CrossingOutcome};
use crate::domain::types::{Direction, OccupancySnapshot, Presence};
use crate::services::crossing_detector::{CrossingDetector, DetectorConfig, DetectorState, DetectorStep};
use crate::services::occupancy::{ExitResult, OccupancyCounter};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of feeding one cycle to the door
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A reset happened while the samples were being taken
    Discarded,
    Observed {
        step: DetectorStep,
        event: Option<CrossingEvent>,
    },
}

/// What a reset cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    /// A sensor was armed when the reset landed
    pub discarded_crossing: bool,
    pub previous: OccupancySnapshot,
    pub snapshot: OccupancySnapshot,
}

struct DoorCore {
    counter: OccupancyCounter,
    detector: CrossingDetector,
    epoch: u64,
}

/// Cloneable handle to the shared door state
#[derive(Clone)]
pub struct DoorCounter {
    core: Arc<Mutex<DoorCore>>,
}

impl DoorCounter {
    pub fn new(detector: DetectorConfig) -> Self {
        Self {
            core: Arc::new(Mutex::new(DoorCore {
                counter: OccupancyCounter::new(),
                detector: CrossingDetector::new(detector),
                epoch: 0,
            })),
        }
    }

    /// Reset generation; read before sampling and pass to `observe`
    pub fn epoch(&self) -> u64 {
        self.core.lock().epoch
    }

    /// Apply one cycle's observations; no-op if a reset happened since `started_epoch`
    pub fn observe(&self, started_epoch: u64, entry: Presence, exit: Presence) -> CycleOutcome {
        let mut core = self.core.lock();
        if core.epoch != started_epoch {
            return CycleOutcome::Discarded;
        }

        let step = core.detector.observe(entry, exit);
        let event = step.crossing.map(|crossing| core.apply(crossing));
        CycleOutcome::Observed { step, event }
    }

    /// Clear counters and detector; returns what was cleared
    pub fn reset(&self) -> ResetReport {
        let mut core = self.core.lock();
        core.epoch = core.epoch.wrapping_add(1);
        let previous = core.counter.snapshot();
        let state = core.detector.state();
        core.counter.reset();
        let discarded_crossing = core.detector.force_idle();

        if discarded_crossing {
            warn!(state = %state.as_str(), "crossing_discarded_by_reset");
        }

        ResetReport { discarded_crossing, previous, snapshot: core.counter.snapshot() }
    }

    pub fn snapshot(&self) -> OccupancySnapshot {
        self.core.lock().counter.snapshot()
    }

    pub fn detector_state(&self) -> DetectorState {
        self.core.lock().detector.state()
    }
}

impl DoorCore {
    fn apply(&mut self, crossing: Crossing) -> CrossingEvent {
        let outcome = match crossing.direction {
            Direction::Entry => {
                self.counter.record_entry();
                CrossingOutcome::Entered
            }
            Direction::Exit => match self.counter.record_exit() {
                ExitResult::Counted => CrossingOutcome::Exited,
                ExitResult::EmptyRoom => CrossingOutcome::ExitRejected,
            },
        };
        let occupancy = self.counter.snapshot();

        match outcome {
            CrossingOutcome::ExitRejected => {
                warn!(
                    outcome = %outcome.as_str(),
                    decided_at = %crossing.decided_at(),
                    exit_armed_at = %crossing.exit_armed_at,
                    entry_armed_at = %crossing.entry_armed_at,
                    "exit_rejected_empty_room"
                );
            }
            CrossingOutcome::Entered | CrossingOutcome::Exited => {
                info!(
                    outcome = %outcome.as_str(),
                    decided_at = %crossing.decided_at(),
                    ambiguous = %crossing.ambiguous,
                    gap_ms = %crossing.arm_gap_ms(),
                    entries = %occupancy.entries,
                    exits = %occupancy.exits,
                    current = %occupancy.current,
                    "crossing_detected"
                );
            }
        }

        CrossingEvent { crossing, outcome, occupancy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Tick;

    fn on(ms: u64) -> Presence {
        Presence::present(Tick(ms))
    }

    fn off(ms: u64) -> Presence {
        Presence::clear(Tick(ms))
    }

    fn event_of(outcome: CycleOutcome) -> Option<CrossingEvent> {
        match outcome {
            CycleOutcome::Observed { event, .. } => event,
            CycleOutcome::Discarded => None,
        }
    }

    #[test]
    fn test_entry_counts() {
        let door = DoorCounter::new(DetectorConfig::default());
        let epoch = door.epoch();
        door.observe(epoch, on(0), off(0));
        let event = event_of(door.observe(epoch, on(50), on(50))).unwrap();
        assert_eq!(event.outcome, CrossingOutcome::Entered);
        assert_eq!(event.outcome.as_str(), "entered");
        assert_eq!(event.crossing.decided_at(), Tick(50));
        assert_eq!(event.occupancy, OccupancySnapshot { entries: 1, exits: 0, current: 1 });
        assert_eq!(door.snapshot(), event.occupancy);
    }

    #[test]
    fn test_exit_on_empty_room_is_rejected() {
        let door = DoorCounter::new(DetectorConfig::default());
        let epoch = door.epoch();
        door.observe(epoch, off(0), on(0));
        let event = event_of(door.observe(epoch, on(40), on(40))).unwrap();
        assert_eq!(event.outcome, CrossingOutcome::ExitRejected);
        assert_eq!(door.snapshot(), OccupancySnapshot::default());
    }

    #[test]
    fn test_reset_mid_crossing_discards_it() {
        let door = DoorCounter::new(DetectorConfig::default());
        door.observe(door.epoch(), on(0), off(0));
        assert_eq!(door.detector_state(), DetectorState::EntryArmed);

        let report = door.reset();
        assert!(report.discarded_crossing);
        assert_eq!(report.snapshot, OccupancySnapshot::default());
        assert_eq!(door.detector_state(), DetectorState::Idle);

        // Next clean crossing is counted from zero
        let epoch = door.epoch();
        door.observe(epoch, off(100), off(100));
        door.observe(epoch, on(200), off(200));
        let event = event_of(door.observe(epoch, off(300), on(300))).unwrap();
        assert_eq!(event.occupancy, OccupancySnapshot { entries: 1, exits: 0, current: 1 });
    }

    #[test]
    fn test_stale_cycle_after_reset_is_discarded() {
        let door = DoorCounter::new(DetectorConfig::default());
        let epoch = door.epoch();
        door.observe(epoch, on(0), off(0));

        // Reset lands while the loop is ranging
        let report = door.reset();
        assert!(report.discarded_crossing);
        assert_eq!(door.observe(epoch, on(50), on(50)), CycleOutcome::Discarded);
        assert_eq!(door.snapshot(), OccupancySnapshot::default());
        assert_eq!(door.detector_state(), DetectorState::Idle);
    }

    #[test]
    fn test_reset_reports_previous_counts() {
        let door = DoorCounter::new(DetectorConfig::default());
        let epoch = door.epoch();
        door.observe(epoch, on(0), off(0));
        door.observe(epoch, off(50), on(50));

        let report = door.reset();
        assert!(!report.discarded_crossing);
        assert_eq!(report.previous.current, 1);
        assert_eq!(door.reset().previous, OccupancySnapshot::default());
    }
}
