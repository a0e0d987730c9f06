//! Monotonic time sources for ranging and detection
//!
//! The ranging driver needs microsecond resolution to time echo pulses; the
//! detector works on millisecond `Tick`s derived from the same source so
//! arming order and echo timing never disagree.

use crate::domain::types::Tick;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait Clock: Send + Sync {
    /// Microseconds since the clock's origin
    fn now_us(&self) -> u64;

    /// Milliseconds since the clock's origin
    fn now(&self) -> Tick {
        Tick(self.now_us() / 1000)
    }

    /// Busy-wait for at least `us` microseconds
    fn delay_us(&self, us: u64) {
        let start = self.now_us();
        while self.now_us().saturating_sub(start) < us {
            std::hint::spin_loop();
        }
    }
}

/// Wall clock anchored at construction (boot)
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Deterministic clock for tests and simulations
///
/// Every read advances time by `step_us`, so busy-wait loops written against
/// `Clock` always make progress even though nothing else moves the clock.
/// Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
    step_us: u64,
}

impl ManualClock {
    pub fn new(step_us: u64) -> Self {
        Self { now_us: Arc::new(AtomicU64::new(0)), step_us }
    }

    /// Move the shared timeline forward by `us`
    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    /// Jump to an absolute millisecond tick (never moves backwards)
    pub fn set_ms(&self, ms: u64) {
        self.now_us.fetch_max(ms * 1000, Ordering::SeqCst);
    }

    /// Current time without advancing
    pub fn peek_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.fetch_add(self.step_us, Ordering::SeqCst)
    }
}
