//! End-to-end door scenarios
//!
//! Drives the full counting path (simulated HC-SR04 lines, ranging driver,
//! detector, counters, collaborators) on a manual clock, one polling cycle at
//! a time.

use door_counter::domain::crossing::{AUDIO_GOODBYE, AUDIO_WELCOME};
use door_counter::domain::types::{Direction, OccupancySnapshot, ResetEdge, SensorSide};
use door_counter::infra::{Config, ManualClock, Metrics};
use door_counter::io::display::{MSG_READY, MSG_RESET};
use door_counter::io::sim_sensor::{SimEcho, SimTrigger};
use door_counter::io::{simulated_sensor, RangeSensor, RecordingAudio, RecordingDisplay, SimTarget};
use door_counter::services::{CounterLoop, DetectorConfig, DetectorState, DoorCounter, ResetHandler};
use std::sync::Arc;

type SimRange = RangeSensor<SimTrigger<ManualClock>, SimEcho<ManualClock>, ManualClock>;

const NEAR: Option<u16> = Some(30);
const FAR: Option<u16> = Some(200);
const OPEN: Option<u16> = None;

struct Doorway {
    clock: ManualClock,
    entry: SimTarget,
    exit: SimTarget,
    door: DoorCounter,
    display: Arc<RecordingDisplay>,
    audio: Arc<RecordingAudio>,
    metrics: Arc<Metrics>,
    counter: CounterLoop<SimRange>,
    reset: ResetHandler,
}

impl Doorway {
    fn new() -> Self {
        Self::with_detector(Config::default().detector_config())
    }

    fn with_detector(detector: DetectorConfig) -> Self {
        let config = Config::default();
        let clock = ManualClock::new(5);

        let (entry_trigger, entry_echo, entry) = simulated_sensor(clock.clone());
        let (exit_trigger, exit_echo, exit) = simulated_sensor(clock.clone());
        let entry_sensor = RangeSensor::new(
            config.range_sensor_config(SensorSide::Entry),
            entry_trigger,
            entry_echo,
            clock.clone(),
        );
        let exit_sensor = RangeSensor::new(
            config.range_sensor_config(SensorSide::Exit),
            exit_trigger,
            exit_echo,
            clock.clone(),
        );

        let door = DoorCounter::new(detector);
        let display = Arc::new(RecordingDisplay::new());
        let audio = Arc::new(RecordingAudio::new());
        let metrics = Arc::new(Metrics::new());

        let counter = CounterLoop::new(
            entry_sensor,
            exit_sensor,
            door.clone(),
            display.clone(),
            audio.clone(),
            metrics.clone(),
            config.effective_poll_interval_ms(),
            config.message_hold_ms(),
        );
        let reset = ResetHandler::new(
            door.clone(),
            display.clone(),
            metrics.clone(),
            config.reset_debounce_ms(),
            config.message_hold_ms(),
        );

        Self { clock, entry, exit, door, display, audio, metrics, counter, reset }
    }

    /// Place the beams and run one polling cycle at `at_ms`
    fn cycle(&mut self, at_ms: u64, entry_cm: Option<u16>, exit_cm: Option<u16>) {
        self.entry.set_distance(entry_cm);
        self.exit.set_distance(exit_cm);
        self.clock.set_ms(at_ms);
        self.counter.poll_cycle();
    }

    /// A person walks entry side to exit side starting at `start_ms`
    fn walk_in(&mut self, start_ms: u64) {
        self.cycle(start_ms, NEAR, OPEN);
        self.cycle(start_ms + 100, NEAR, NEAR);
        self.cycle(start_ms + 200, OPEN, NEAR);
        self.cycle(start_ms + 300, OPEN, OPEN);
    }

    /// A person walks exit side to entry side starting at `start_ms`
    fn walk_out(&mut self, start_ms: u64) {
        self.cycle(start_ms, OPEN, NEAR);
        self.cycle(start_ms + 100, NEAR, NEAR);
        self.cycle(start_ms + 200, NEAR, OPEN);
        self.cycle(start_ms + 300, OPEN, OPEN);
    }
}

#[test]
fn test_walk_in_then_out() {
    let mut d = Doorway::new();

    d.walk_in(0);
    assert_eq!(d.door.snapshot(), OccupancySnapshot { entries: 1, exits: 0, current: 1 });

    d.walk_out(1000);
    assert_eq!(d.door.snapshot(), OccupancySnapshot { entries: 1, exits: 1, current: 0 });

    assert_eq!(d.audio.played(), vec![AUDIO_WELCOME, AUDIO_GOODBYE]);
    assert_eq!(
        d.display.messages(),
        vec!["Person Entered".to_string(), "Person Exited".to_string()]
    );
    assert_eq!(d.display.last_counters(), Some((1, 0, 1)));
}

#[test]
fn test_far_objects_do_not_count() {
    let mut d = Doorway::new();
    for i in 0..10 {
        d.cycle(i * 100, FAR, FAR);
    }
    assert_eq!(d.door.snapshot(), OccupancySnapshot::default());
    assert_eq!(d.door.detector_state(), DetectorState::Idle);
    assert_eq!(d.metrics.ranging_timeouts(SensorSide::Entry), 0);
}

#[test]
fn test_open_beams_time_out_without_counting() {
    let mut d = Doorway::new();
    for i in 0..5 {
        d.cycle(i * 100, OPEN, OPEN);
    }
    assert_eq!(d.metrics.ranging_timeouts(SensorSide::Entry), 5);
    assert_eq!(d.metrics.ranging_timeouts(SensorSide::Exit), 5);
    assert_eq!(d.door.snapshot(), OccupancySnapshot::default());
}

#[test]
fn test_exit_on_empty_room_is_rejected() {
    let mut d = Doorway::new();
    d.walk_out(0);

    assert_eq!(d.door.snapshot(), OccupancySnapshot::default());
    assert_eq!(d.display.messages(), vec!["No one inside!".to_string()]);
    assert!(d.audio.played().is_empty());
    assert_eq!(d.metrics.exits_rejected_total(), 1);
}

#[test]
fn test_loitering_expires_without_event() {
    let mut d = Doorway::new();

    // Someone stands in the exit beam for four seconds and walks away
    for t in (0..=4000).step_by(100) {
        d.cycle(t, OPEN, NEAR);
    }
    d.cycle(4100, OPEN, OPEN);

    assert_eq!(d.door.snapshot(), OccupancySnapshot::default());
    assert_eq!(d.door.detector_state(), DetectorState::Idle);
    assert_eq!(d.metrics.arm_expired_total(), 1);
    assert!(d.display.messages().is_empty());

    // The stale exit arm must not turn the next visitor into an exit
    d.walk_in(5000);
    assert_eq!(d.door.snapshot(), OccupancySnapshot { entries: 1, exits: 0, current: 1 });
}

#[test]
fn test_person_lingering_in_exit_beam_does_not_pair_with_next_entry() {
    let mut d = Doorway::new();

    d.cycle(0, NEAR, OPEN);
    d.cycle(100, NEAR, NEAR);
    // First visitor stops just inside, still under the exit sensor
    d.cycle(200, OPEN, NEAR);
    d.cycle(300, OPEN, NEAR);
    // Second visitor arrives while the exit beam is still covered
    d.cycle(400, NEAR, NEAR);
    d.cycle(500, NEAR, NEAR);
    // First visitor moves on, second walks through
    d.cycle(600, NEAR, OPEN);
    d.cycle(700, OPEN, NEAR);
    d.cycle(800, OPEN, OPEN);

    assert_eq!(d.door.snapshot(), OccupancySnapshot { entries: 2, exits: 0, current: 2 });
    assert_eq!(d.audio.played(), vec![AUDIO_WELCOME, AUDIO_WELCOME]);
}

#[test]
fn test_reset_mid_crossing_discards_it() {
    let mut d = Doorway::new();
    d.walk_in(0);
    d.walk_in(1000);
    assert_eq!(d.door.snapshot().current, 2);

    // Halfway through a third entry the reset button is pressed
    d.cycle(2000, NEAR, OPEN);
    let report = d.reset.fire(ResetEdge::now()).unwrap();
    assert!(report.discarded_crossing);
    assert_eq!(report.previous.current, 2);

    // The visitor finishes walking through; that crossing is gone and the
    // exit beam they break on the way leaves nothing armed
    d.cycle(2100, NEAR, NEAR);
    d.cycle(2200, OPEN, NEAR);
    d.cycle(2300, OPEN, OPEN);
    assert_eq!(d.door.snapshot(), OccupancySnapshot::default());
    assert_eq!(d.door.detector_state(), DetectorState::Idle);

    // The next visitor arrives well inside the grace window
    d.walk_in(3000);
    assert_eq!(d.metrics.arm_expired_total(), 0);
    assert_eq!(d.metrics.exits_rejected_total(), 0);
    assert!(!d.display.messages().contains(&"No one inside!".to_string()));
    assert_eq!(d.door.snapshot(), OccupancySnapshot { entries: 1, exits: 0, current: 1 });
    assert_eq!(d.metrics.resets_total(), 1);
    assert_eq!(d.metrics.crossings_discarded_total(), 1);
    assert!(d.display.messages().contains(&MSG_RESET.to_string()));
}

#[test]
fn test_outcome_message_returns_to_ready() {
    let mut d = Doorway::new();
    d.walk_in(0);
    d.cycle(1000, OPEN, OPEN);
    d.cycle(2200, OPEN, OPEN);

    assert_eq!(
        d.display.messages(),
        vec!["Person Entered".to_string(), MSG_READY.to_string()]
    );
}

#[test]
fn test_many_visitors_keep_counts_consistent() {
    let mut d = Doorway::new();
    let mut t = 0;
    for _ in 0..5 {
        d.walk_in(t);
        t += 1000;
    }
    for _ in 0..3 {
        d.walk_out(t);
        t += 1000;
    }
    let s = d.door.snapshot();
    assert_eq!(s, OccupancySnapshot { entries: 5, exits: 3, current: 2 });
    assert_eq!(d.metrics.entries_total(), 5);
    assert_eq!(d.metrics.exits_total(), 3);
}

#[test]
fn test_both_beams_in_one_cycle_is_ambiguous() {
    let mut d = Doorway::new();
    d.cycle(0, NEAR, NEAR);
    d.cycle(100, OPEN, OPEN);

    // Default tie-break is entry, flagged as ambiguous
    assert_eq!(d.door.snapshot(), OccupancySnapshot { entries: 1, exits: 0, current: 1 });
    assert_eq!(d.metrics.ambiguous_total(), 1);
}

#[test]
fn test_both_beams_in_one_cycle_follows_exit_tie_break() {
    let mut d = Doorway::with_detector(DetectorConfig {
        tie_break: Direction::Exit,
        ..DetectorConfig::default()
    });
    d.walk_in(0);
    d.cycle(1000, NEAR, NEAR);
    d.cycle(1100, OPEN, OPEN);

    assert_eq!(d.door.snapshot(), OccupancySnapshot { entries: 1, exits: 1, current: 0 });
    assert_eq!(d.metrics.ambiguous_total(), 1);
    assert_eq!(d.audio.played(), vec![AUDIO_WELCOME, AUDIO_GOODBYE]);
}
