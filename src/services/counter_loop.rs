//! Polling loop - samples both sensors and drives the door state
//!
//! One cycle: read the reset epoch, range entry then exit (each bounded by its
//! wait budget), threshold both samples against one cycle tick, apply them to
//! the door, and tell the display and audio about any counted crossing.
//! Collaborator calls happen after the door lock is released.
//!
//! Outcome messages stay up for `message_hold_ms` and are then replaced with
//! "System Ready". The hold is checked against sample ticks each cycle, so the
//! loop never sleeps for it.

use crate::domain::crossing::{CrossingEvent, CrossingOutcome};
use crate::domain::types::{Presence, SensorSide, Tick};
use crate::infra::metrics::Metrics;
use crate::io::audio::AudioPlayer;
use crate::io::display::{StatusDisplay, MSG_READY, OUTCOME_ROW_Y, STATUS_X, SYSTEM_ROW_Y};
use crate::io::ranging::Ranging;
use crate::services::door::{CycleOutcome, DoorCounter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct CounterLoop<R> {
    entry: R,
    exit: R,
    door: DoorCounter,
    display: Arc<dyn StatusDisplay>,
    audio: Arc<dyn AudioPlayer>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
    message_hold_ms: u64,
    /// When the outcome row should go back to "System Ready"
    ready_restore_at: Option<Tick>,
}

impl<R: Ranging> CounterLoop<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: R,
        exit: R,
        door: DoorCounter,
        display: Arc<dyn StatusDisplay>,
        audio: Arc<dyn AudioPlayer>,
        metrics: Arc<Metrics>,
        poll_interval_ms: u64,
        message_hold_ms: u64,
    ) -> Self {
        Self {
            entry,
            exit,
            door,
            display,
            audio,
            metrics,
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            message_hold_ms,
            ready_restore_at: None,
        }
    }

    pub fn door(&self) -> &DoorCounter {
        &self.door
    }

    /// Run one sampling cycle
    pub fn poll_cycle(&mut self) -> CycleOutcome {
        let started = Instant::now();
        let epoch = self.door.epoch();

        let entry_sample = self.entry.measure();
        let exit_sample = self.exit.measure();
        if entry_sample.distance.is_timeout() {
            self.metrics.record_ranging_timeout(SensorSide::Entry);
        }
        if exit_sample.distance.is_timeout() {
            self.metrics.record_ranging_timeout(SensorSide::Exit);
        }

        // Both sensors are stamped with the cycle's start tick. Arming order
        // inside one cycle is unknowable, so same-cycle arms must tie.
        let now = entry_sample.timestamp;
        let entry =
            Presence { at: now, ..Presence::from_sample(&entry_sample, self.entry.threshold_cm()) };
        let exit =
            Presence { at: now, ..Presence::from_sample(&exit_sample, self.exit.threshold_cm()) };

        let outcome = self.door.observe(epoch, entry, exit);
        match outcome {
            CycleOutcome::Discarded => {
                debug!(epoch = %epoch, "cycle_discarded_by_reset");
                self.metrics.record_cycle_discarded();
            }
            CycleOutcome::Observed { step, event } => {
                let expired = step.expired_count();
                if expired > 0 {
                    self.metrics.record_arm_expired(expired);
                }
                if let Some(event) = event {
                    self.notify(&event, now);
                }
            }
        }

        self.restore_ready_if_due(now);
        self.metrics.record_cycle(started.elapsed().as_micros() as u64);
        outcome
    }

    fn notify(&mut self, event: &CrossingEvent, now: Tick) {
        match event.outcome {
            CrossingOutcome::Entered => self.metrics.record_entry(),
            CrossingOutcome::Exited => self.metrics.record_exit(),
            CrossingOutcome::ExitRejected => self.metrics.record_exit_rejected(),
        }
        if event.crossing.ambiguous {
            self.metrics.record_ambiguous();
        }

        self.display.display(event.outcome.message(), STATUS_X, OUTCOME_ROW_Y);
        if let Some(file_id) = event.outcome.audio_file() {
            self.audio.play(file_id);
        }
        let s = event.occupancy;
        self.display.update_counters(s.entries, s.current, s.exits);

        self.ready_restore_at = Some(Tick(now.0.saturating_add(self.message_hold_ms)));
    }

    fn restore_ready_if_due(&mut self, now: Tick) {
        if let Some(at) = self.ready_restore_at {
            if now >= at {
                self.display.display(MSG_READY, STATUS_X, OUTCOME_ROW_Y);
                self.ready_restore_at = None;
            }
        }
    }

    /// Poll until shutdown is signalled
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.display.display(MSG_READY, STATUS_X, SYSTEM_ROW_Y);
        let s = self.door.snapshot();
        self.display.update_counters(s.entries, s.current, s.exits);

        info!(
            poll_interval_ms = %self.poll_interval.as_millis(),
            message_hold_ms = %self.message_hold_ms,
            "counter_loop_started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.poll_cycle();
                }
            }
        }

        info!("counter_loop_stopped");
    }
}
