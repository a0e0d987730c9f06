//! Entry/exit/occupancy counters
//!
//! Invariant: `current == entries - exits` and `current` never goes below
//! zero. An exit with an empty room is refused rather than clamped, so the
//! invariant holds without any saturating arithmetic hiding a miscount.
//!
//! The counter itself is plain data. Mutual exclusion against the reset path
//! comes from the lock in `DoorCounter`; every method here takes `&mut self`,
//! so no two of them can interleave.

use crate::domain::types::OccupancySnapshot;

/// Result of `record_exit`
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitResult {
    Counted,
    /// The room was already empty; nothing changed
    EmptyRoom,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyCounter {
    entries: u64,
    exits: u64,
    current: u64,
}

impl OccupancyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entry(&mut self) {
        self.entries += 1;
        self.current += 1;
    }

    pub fn record_exit(&mut self) -> ExitResult {
        if self.current == 0 {
            return ExitResult::EmptyRoom;
        }
        self.exits += 1;
        self.current -= 1;
        ExitResult::Counted
    }

    pub fn reset(&mut self) {
        self.entries = 0;
        self.exits = 0;
        self.current = 0;
    }

    #[inline]
    pub fn snapshot(&self) -> OccupancySnapshot {
        OccupancySnapshot { entries: self.entries, exits: self.exits, current: self.current }
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn exits(&self) -> u64 {
        self.exits
    }

    pub fn current(&self) -> u64 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_entry_increments_entries_and_current() {
        let mut counter = OccupancyCounter::new();
        counter.record_entry();
        counter.record_entry();
        assert_eq!(counter.snapshot(), OccupancySnapshot { entries: 2, exits: 0, current: 2 });
    }

    #[test]
    fn test_exit_decrements_current() {
        let mut counter = OccupancyCounter::new();
        counter.record_entry();
        assert_eq!(counter.record_exit(), ExitResult::Counted);
        assert_eq!(counter.snapshot(), OccupancySnapshot { entries: 1, exits: 1, current: 0 });
    }

    #[test]
    fn test_exit_with_empty_room_is_rejected() {
        let mut counter = OccupancyCounter::new();
        assert_eq!(counter.record_exit(), ExitResult::EmptyRoom);
        assert_eq!(counter.snapshot(), OccupancySnapshot::default());

        counter.record_entry();
        assert_eq!(counter.record_exit(), ExitResult::Counted);
        assert_eq!(counter.record_exit(), ExitResult::EmptyRoom);
        assert_eq!(counter.snapshot(), OccupancySnapshot { entries: 1, exits: 1, current: 0 });
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut counter = OccupancyCounter::new();
        counter.record_entry();
        counter.record_entry();
        let _ = counter.record_exit();

        counter.reset();
        let once = counter.clone();
        counter.reset();
        counter.reset();
        assert_eq!(counter, once);
        assert_eq!(counter.snapshot(), OccupancySnapshot::default());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Entry,
        Exit,
        Reset,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![4 => Just(Op::Entry), 4 => Just(Op::Exit), 1 => Just(Op::Reset)]
    }

    proptest! {
        #[test]
        fn prop_current_equals_entries_minus_exits(ops in prop::collection::vec(op(), 0..200)) {
            let mut counter = OccupancyCounter::new();
            for op in ops {
                let before = counter.snapshot();
                match op {
                    Op::Entry => counter.record_entry(),
                    Op::Exit => {
                        if counter.record_exit() == ExitResult::EmptyRoom {
                            prop_assert_eq!(before.current, 0);
                            prop_assert_eq!(counter.snapshot(), before);
                        }
                    }
                    Op::Reset => counter.reset(),
                }
                let s = counter.snapshot();
                prop_assert!(s.entries >= s.exits);
                prop_assert_eq!(s.current, s.entries - s.exits);
            }
        }
    }
}
