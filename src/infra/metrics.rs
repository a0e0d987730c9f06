//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics so the polling loop and the reset handler never contend on a
//! lock just to count something. Reporting swaps the periodic counters to
//! zero; totals are monotonic.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Occupancy itself lives behind the door counter's lock; never
//! read it from here for logic decisions.

use crate::domain::types::SensorSide;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries for polling cycle time (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Polling cycles run (monotonic)
    cycles_total: AtomicU64,
    /// Cycles since last report (reset on report)
    cycles_since_report: AtomicU64,
    /// Sum of cycle times in microseconds (reset on report)
    cycle_time_sum_us: AtomicU64,
    /// Longest cycle in microseconds (reset on report)
    cycle_time_max_us: AtomicU64,
    /// Cycle time histogram buckets (reset on report)
    cycle_time_buckets: [AtomicU64; NUM_BUCKETS],
    /// Ranging timeouts on the entry-side sensor (monotonic)
    entry_timeouts_total: AtomicU64,
    /// Ranging timeouts on the exit-side sensor (monotonic)
    exit_timeouts_total: AtomicU64,
    entries_total: AtomicU64,
    exits_total: AtomicU64,
    /// Exits decided while the room was empty
    exits_rejected_total: AtomicU64,
    /// Crossings whose direction came from the tie-break
    ambiguous_total: AtomicU64,
    /// Arms dropped by grace expiry
    arm_expired_total: AtomicU64,
    resets_total: AtomicU64,
    /// Resets that landed while a sensor was armed
    crossings_discarded_total: AtomicU64,
    /// Cycles whose samples straddled a reset and were dropped
    cycles_discarded_total: AtomicU64,
    /// Reset edges ignored by debounce
    reset_bounces_total: AtomicU64,
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            cycles_since_report: AtomicU64::new(0),
            cycle_time_sum_us: AtomicU64::new(0),
            cycle_time_max_us: AtomicU64::new(0),
            cycle_time_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            entry_timeouts_total: AtomicU64::new(0),
            exit_timeouts_total: AtomicU64::new(0),
            entries_total: AtomicU64::new(0),
            exits_total: AtomicU64::new(0),
            exits_rejected_total: AtomicU64::new(0),
            ambiguous_total: AtomicU64::new(0),
            arm_expired_total: AtomicU64::new(0),
            resets_total: AtomicU64::new(0),
            crossings_discarded_total: AtomicU64::new(0),
            cycles_discarded_total: AtomicU64::new(0),
            reset_bounces_total: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record one polling cycle and how long it took
    #[inline]
    pub fn record_cycle(&self, cycle_time_us: u64) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        self.cycles_since_report.fetch_add(1, Ordering::Relaxed);
        self.cycle_time_sum_us.fetch_add(cycle_time_us, Ordering::Relaxed);
        self.cycle_time_buckets[bucket_index(cycle_time_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.cycle_time_max_us, cycle_time_us);
    }

    #[inline]
    pub fn record_ranging_timeout(&self, side: SensorSide) {
        let counter = match side {
            SensorSide::Entry => &self.entry_timeouts_total,
            SensorSide::Exit => &self.exit_timeouts_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_entry(&self) {
        self.entries_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exit(&self) {
        self.exits_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exit_rejected(&self) {
        self.exits_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ambiguous(&self) {
        self.ambiguous_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_arm_expired(&self, count: u64) {
        self.arm_expired_total.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an applied reset; `discarded_crossing` when it cut one short
    #[inline]
    pub fn record_reset(&self, discarded_crossing: bool) {
        self.resets_total.fetch_add(1, Ordering::Relaxed);
        if discarded_crossing {
            self.crossings_discarded_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_cycle_discarded(&self) {
        self.cycles_discarded_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reset_bounce(&self) {
        self.reset_bounces_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    pub fn ranging_timeouts(&self, side: SensorSide) -> u64 {
        match side {
            SensorSide::Entry => self.entry_timeouts_total.load(Ordering::Relaxed),
            SensorSide::Exit => self.exit_timeouts_total.load(Ordering::Relaxed),
        }
    }

    pub fn entries_total(&self) -> u64 {
        self.entries_total.load(Ordering::Relaxed)
    }

    pub fn exits_total(&self) -> u64 {
        self.exits_total.load(Ordering::Relaxed)
    }

    pub fn exits_rejected_total(&self) -> u64 {
        self.exits_rejected_total.load(Ordering::Relaxed)
    }

    pub fn ambiguous_total(&self) -> u64 {
        self.ambiguous_total.load(Ordering::Relaxed)
    }

    pub fn arm_expired_total(&self) -> u64 {
        self.arm_expired_total.load(Ordering::Relaxed)
    }

    pub fn resets_total(&self) -> u64 {
        self.resets_total.load(Ordering::Relaxed)
    }

    pub fn crossings_discarded_total(&self) -> u64 {
        self.crossings_discarded_total.load(Ordering::Relaxed)
    }

    pub fn cycles_discarded_total(&self) -> u64 {
        self.cycles_discarded_total.load(Ordering::Relaxed)
    }

    pub fn reset_bounces_total(&self) -> u64 {
        self.reset_bounces_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self, current_occupancy: u64) -> MetricsSummary {
        let cycles = self.cycles_since_report.swap(0, Ordering::Relaxed);
        let cycle_sum = self.cycle_time_sum_us.swap(0, Ordering::Relaxed);
        let cycle_max = self.cycle_time_max_us.swap(0, Ordering::Relaxed);
        let cycle_buckets = swap_buckets(&self.cycle_time_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let cycles_per_sec = if elapsed.as_secs_f64() > 0.0 {
            cycles as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            cycles_total: self.cycles_total(),
            cycles_per_sec,
            avg_cycle_us: if cycles > 0 { cycle_sum / cycles } else { 0 },
            max_cycle_us: cycle_max,
            cycle_p99_us: percentile_from_buckets(&cycle_buckets, 0.99),
            cycle_buckets,
            entry_timeouts_total: self.ranging_timeouts(SensorSide::Entry),
            exit_timeouts_total: self.ranging_timeouts(SensorSide::Exit),
            entries_total: self.entries_total(),
            exits_total: self.exits_total(),
            exits_rejected_total: self.exits_rejected_total(),
            ambiguous_total: self.ambiguous_total(),
            arm_expired_total: self.arm_expired_total(),
            resets_total: self.resets_total(),
            crossings_discarded_total: self.crossings_discarded_total(),
            cycles_discarded_total: self.cycles_discarded_total(),
            reset_bounces_total: self.reset_bounces_total(),
            current_occupancy,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub cycles_total: u64,
    pub cycles_per_sec: f64,
    pub avg_cycle_us: u64,
    pub max_cycle_us: u64,
    /// 99th percentile cycle time (µs)
    pub cycle_p99_us: u64,
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub cycle_buckets: [u64; NUM_BUCKETS],
    pub entry_timeouts_total: u64,
    pub exit_timeouts_total: u64,
    pub entries_total: u64,
    pub exits_total: u64,
    pub exits_rejected_total: u64,
    pub ambiguous_total: u64,
    pub arm_expired_total: u64,
    pub resets_total: u64,
    pub crossings_discarded_total: u64,
    pub cycles_discarded_total: u64,
    pub reset_bounces_total: u64,
    /// Occupancy at report time, read from the door counter
    pub current_occupancy: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            cycles_total = %self.cycles_total,
            cycles_per_sec = format!("{:.1}", self.cycles_per_sec),
            avg_cycle_us = %self.avg_cycle_us,
            max_cycle_us = %self.max_cycle_us,
            p99_cycle_us = %self.cycle_p99_us,
            entry_timeouts = %self.entry_timeouts_total,
            exit_timeouts = %self.exit_timeouts_total,
            entries = %self.entries_total,
            exits = %self.exits_total,
            exits_rejected = %self.exits_rejected_total,
            ambiguous = %self.ambiguous_total,
            arm_expired = %self.arm_expired_total,
            resets = %self.resets_total,
            crossings_discarded = %self.crossings_discarded_total,
            cycles_discarded = %self.cycles_discarded_total,
            reset_bounces = %self.reset_bounces_total,
            occupancy = %self.current_occupancy,
            "metrics"
        );
    }
}
