//! Simulated ultrasonic sensors and a scripted doorway walker
//!
//! `simulated_sensor` returns trigger/echo line halves that behave like an
//! HC-SR04 on the given clock: a trigger pulse of at least 10 µs schedules an
//! echo that rises after a fixed latency and stays high for
//! `distance × 58 µs`. With nothing within rated range the echo never rises,
//! which exercises the driver's timeout path exactly like an open beam.
//!
//! `SimulatedDoorway` moves people through the two beams on a schedule taken
//! from `[simulation]` in the config, so the whole loop runs without hardware.

use crate::domain::types::{Direction, ResetEdge, SensorSide};
use crate::infra::clock::Clock;
use crate::infra::config::{SimStep, SimulationConfig};
use crate::io::ranging::{EchoLine, TriggerLine, TRIGGER_PULSE_US, US_PER_CM};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

/// Delay between trigger falling edge and echo rising edge
const ECHO_LATENCY_US: u64 = 500;
/// Beyond this the simulated sensor reports nothing (no echo)
const MAX_RANGE_CM: u16 = 400;

#[derive(Debug, Default)]
struct Transducer {
    target_cm: Option<u16>,
    trigger_high_at: Option<u64>,
    /// [rise, fall) window of the pending echo, in clock microseconds
    echo_window: Option<(u64, u64)>,
}

/// Trigger half of a simulated sensor
pub struct SimTrigger<C> {
    state: Arc<Mutex<Transducer>>,
    clock: C,
}

/// Echo half of a simulated sensor
pub struct SimEcho<C> {
    state: Arc<Mutex<Transducer>>,
    clock: C,
}

/// Handle that places (or removes) an object in front of a simulated sensor
#[derive(Clone)]
pub struct SimTarget {
    state: Arc<Mutex<Transducer>>,
}

impl SimTarget {
    /// Put an object `cm` away, or clear the beam with `None`
    pub fn set_distance(&self, cm: Option<u16>) {
        self.state.lock().target_cm = cm;
    }

    pub fn distance(&self) -> Option<u16> {
        self.state.lock().target_cm
    }
}

/// Build one simulated sensor on `clock`
pub fn simulated_sensor<C: Clock + Clone>(clock: C) -> (SimTrigger<C>, SimEcho<C>, SimTarget) {
    let state = Arc::new(Mutex::new(Transducer::default()));
    (
        SimTrigger { state: state.clone(), clock: clock.clone() },
        SimEcho { state: state.clone(), clock },
        SimTarget { state },
    )
}

impl<C: Clock> TriggerLine for SimTrigger<C> {
    fn set_high(&mut self) {
        let now = self.clock.now_us();
        let mut state = self.state.lock();
        state.trigger_high_at = Some(now);
        state.echo_window = None;
    }

    fn set_low(&mut self) {
        let now = self.clock.now_us();
        let mut state = self.state.lock();
        let Some(high_at) = state.trigger_high_at.take() else {
            return;
        };
        if now.saturating_sub(high_at) < TRIGGER_PULSE_US {
            // Too short to start a burst
            return;
        }
        state.echo_window = match state.target_cm {
            Some(cm) if cm <= MAX_RANGE_CM => {
                let rise = now + ECHO_LATENCY_US;
                Some((rise, rise + u64::from(cm) * US_PER_CM))
            }
            _ => None,
        };
    }
}

impl<C: Clock> EchoLine for SimEcho<C> {
    fn is_high(&mut self) -> bool {
        let now = self.clock.now_us();
        match self.state.lock().echo_window {
            Some((rise, fall)) => now >= rise && now < fall,
            None => false,
        }
    }
}

/// One scheduled change to the simulated world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimAction {
    Beam { side: SensorSide, distance_cm: Option<u16> },
    Reset,
}

/// Expand walker steps into a time-ordered list of beam changes
pub fn timeline(config: &SimulationConfig) -> Vec<(u64, SimAction)> {
    let near = Some(config.near_cm);
    let stride = config.stride_ms;
    let mut actions = Vec::with_capacity(config.steps.len() * 4);

    for step in &config.steps {
        match *step {
            SimStep::Walk { at_ms, direction } => {
                let (first, second) = match direction {
                    Direction::Entry => (SensorSide::Entry, SensorSide::Exit),
                    Direction::Exit => (SensorSide::Exit, SensorSide::Entry),
                };
                actions.push((at_ms, SimAction::Beam { side: first, distance_cm: near }));
                actions.push((at_ms + stride, SimAction::Beam { side: second, distance_cm: near }));
                actions.push((at_ms + 2 * stride, SimAction::Beam { side: first, distance_cm: None }));
                actions.push((at_ms + 3 * stride, SimAction::Beam { side: second, distance_cm: None }));
            }
            SimStep::Linger { at_ms, side, hold_ms } => {
                actions.push((at_ms, SimAction::Beam { side, distance_cm: near }));
                actions.push((at_ms + hold_ms, SimAction::Beam { side, distance_cm: None }));
            }
            SimStep::Reset { at_ms } => actions.push((at_ms, SimAction::Reset)),
        }
    }

    // Stable sort keeps same-tick actions in script order
    actions.sort_by_key(|(at, _)| *at);
    actions
}

/// Drives two simulated sensors (and optionally the reset line) from a script
pub struct SimulatedDoorway {
    entry: SimTarget,
    exit: SimTarget,
    reset_tx: Option<mpsc::Sender<ResetEdge>>,
    config: SimulationConfig,
}

impl SimulatedDoorway {
    pub fn new(entry: SimTarget, exit: SimTarget, config: SimulationConfig) -> Self {
        Self { entry, exit, reset_tx: None, config }
    }

    /// Route scripted reset presses into the reset handler
    pub fn with_reset_tx(mut self, tx: mpsc::Sender<ResetEdge>) -> Self {
        self.reset_tx = Some(tx);
        self
    }

    fn apply(&self, action: SimAction) {
        match action {
            SimAction::Beam { side, distance_cm } => {
                let target = match side {
                    SensorSide::Entry => &self.entry,
                    SensorSide::Exit => &self.exit,
                };
                target.set_distance(distance_cm);
                debug!(sensor = %side.as_str(), distance_cm = ?distance_cm, "sim_beam_changed");
            }
            SimAction::Reset => {
                info!("sim_reset_pressed");
                if let Some(tx) = &self.reset_tx {
                    if tx.try_send(ResetEdge::now()).is_err() {
                        warn!("sim_reset_dropped");
                    }
                }
            }
        }
    }

    /// Play the script until it ends (or forever when repeating) or shutdown
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let actions = timeline(&self.config);
        if actions.is_empty() {
            info!("sim_script_empty");
            return;
        }

        let script_len_ms = actions.last().map(|(at, _)| *at).unwrap_or(0);
        let period_ms = self.config.repeat_every_ms.max(script_len_ms + 1);
        let origin = Instant::now();
        let mut round: u64 = 0;

        info!(actions = actions.len(), repeat_every_ms = %self.config.repeat_every_ms, "sim_started");

        loop {
            let round_start = origin + Duration::from_millis(round * period_ms);
            for (at_ms, action) in &actions {
                tokio::select! {
                    _ = sleep_until(round_start + Duration::from_millis(*at_ms)) => self.apply(*action),
                    _ = shutdown.changed() => {
                        info!("sim_stopped");
                        return;
                    }
                }
            }

            if self.config.repeat_every_ms == 0 {
                break;
            }
            round += 1;
        }

        info!("sim_script_finished");
    }
}
