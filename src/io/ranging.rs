//! Ultrasonic ranging driver
//!
//! Protocol (HC-SR04 style):
//! - Trigger line high for at least 10 µs, then low
//! - Echo line rises once the burst is sent and stays high for the round trip
//! - Distance (cm) = echo high time (µs) / 58
//!
//! Both the wait for the rising edge and the wait for the falling edge share
//! one budget measured from the end of the trigger pulse. An unplugged or
//! out-of-range sensor therefore costs at most `max_wait_us` per cycle and
//! never stalls the polling loop.

use crate::domain::types::{Distance, Sample, SensorSide};
use crate::infra::clock::Clock;
use thiserror::Error;
use tracing::debug;

/// Minimum trigger pulse width
pub const TRIGGER_PULSE_US: u64 = 10;
/// Echo microseconds per centimeter of distance (round trip at ~343 m/s)
pub const US_PER_CM: u64 = 58;
/// ~4 m rated range is ~23 ms round trip, plus margin
pub const DEFAULT_MAX_WAIT_US: u64 = 30_000;

/// Output line driving a sensor's trigger input
pub trait TriggerLine {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Input line reading a sensor's echo output
pub trait EchoLine {
    fn is_high(&mut self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangingError {
    #[error("echo never rose within {waited_us}us")]
    EchoNeverRose { waited_us: u64 },
    #[error("echo still high after {waited_us}us")]
    EchoNeverFell { waited_us: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSensorConfig {
    pub side: SensorSide,
    pub threshold_cm: u16,
    pub max_wait_us: u64,
}

/// Anything that produces one timestamped sample per call
///
/// The polling loop only needs this; `RangeSensor` is the hardware-facing
/// implementation.
pub trait Ranging {
    fn side(&self) -> SensorSide;

    /// Readings strictly below this count as "object present"
    fn threshold_cm(&self) -> u16;

    /// Take one reading; never blocks past the sensor's wait budget
    fn measure(&mut self) -> Sample;
}

/// One trigger/echo pair plus its immutable configuration
pub struct RangeSensor<T, E, C> {
    config: RangeSensorConfig,
    trigger: T,
    echo: E,
    clock: C,
}

impl<T, E, C> RangeSensor<T, E, C>
where
    T: TriggerLine,
    E: EchoLine,
    C: Clock,
{
    pub fn new(config: RangeSensorConfig, mut trigger: T, echo: E, clock: C) -> Self {
        trigger.set_low();
        Self { config, trigger, echo, clock }
    }

    pub fn config(&self) -> &RangeSensorConfig {
        &self.config
    }

    /// Fire one ranging cycle and return the distance in centimeters
    pub fn try_measure(&mut self) -> Result<u16, RangingError> {
        self.trigger.set_high();
        self.clock.delay_us(TRIGGER_PULSE_US);
        self.trigger.set_low();

        let start = self.clock.now_us();
        let max_wait_us = self.config.max_wait_us;

        let rose_at = loop {
            let now = self.clock.now_us();
            if self.echo.is_high() {
                break now;
            }
            let waited_us = now.saturating_sub(start);
            if waited_us > max_wait_us {
                return Err(RangingError::EchoNeverRose { waited_us });
            }
            std::hint::spin_loop();
        };

        loop {
            let now = self.clock.now_us();
            if !self.echo.is_high() {
                let width_us = now.saturating_sub(rose_at);
                return Ok(u16::try_from(width_us / US_PER_CM).unwrap_or(u16::MAX));
            }
            let waited_us = now.saturating_sub(start);
            if waited_us > max_wait_us {
                return Err(RangingError::EchoNeverFell { waited_us });
            }
            std::hint::spin_loop();
        }
    }
}

impl<T, E, C> Ranging for RangeSensor<T, E, C>
where
    T: TriggerLine,
    E: EchoLine,
    C: Clock,
{
    fn side(&self) -> SensorSide {
        self.config.side
    }

    fn threshold_cm(&self) -> u16 {
        self.config.threshold_cm
    }

    fn measure(&mut self) -> Sample {
        let timestamp = self.clock.now();
        match self.try_measure() {
            Ok(cm) => Sample::new(Distance::Centimeters(cm), timestamp),
            Err(e) => {
                debug!(sensor = %self.config.side.as_str(), error = %e, "ranging_timeout");
                Sample::timeout(timestamp)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::clock::{ManualClock, MonotonicClock};
    use std::time::Instant;

    fn config(max_wait_us: u64) -> RangeSensorConfig {
        RangeSensorConfig { side: SensorSide::Entry, threshold_cm: 50, max_wait_us }
    }

    /// Trigger that remembers when it went high and low on the shared clock
    struct RecordingTrigger {
        clock: ManualClock,
        rose_at: Option<u64>,
        fell_at: Option<u64>,
    }

    impl TriggerLine for RecordingTrigger {
        fn set_high(&mut self) {
            self.rose_at = Some(self.clock.peek_us());
        }

        fn set_low(&mut self) {
            self.fell_at = Some(self.clock.peek_us());
        }
    }

    struct NoopTrigger;

    impl TriggerLine for NoopTrigger {
        fn set_high(&mut self) {}
        fn set_low(&mut self) {}
    }

    /// Echo that is high inside a fixed window on the shared clock
    struct WindowEcho {
        clock: ManualClock,
        rise_us: u64,
        fall_us: u64,
    }

    impl EchoLine for WindowEcho {
        fn is_high(&mut self) -> bool {
            let now = self.clock.peek_us();
            now >= self.rise_us && now < self.fall_us
        }
    }

    struct StuckEcho(bool);

    impl EchoLine for StuckEcho {
        fn is_high(&mut self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_measures_echo_width() {
        let clock = ManualClock::new(1);
        let echo = WindowEcho { clock: clock.clone(), rise_us: 500, fall_us: 500 + 40 * US_PER_CM };
        let mut sensor = RangeSensor::new(config(DEFAULT_MAX_WAIT_US), NoopTrigger, echo, clock);

        let cm = sensor.try_measure().unwrap();
        assert!((39..=41).contains(&cm), "measured {cm}cm");
    }

    #[test]
    fn test_trigger_pulse_is_at_least_ten_us() {
        let clock = ManualClock::new(1);
        let trigger = RecordingTrigger { clock: clock.clone(), rose_at: None, fell_at: None };
        let echo = WindowEcho { clock: clock.clone(), rise_us: 100, fall_us: 200 };
        let mut sensor = RangeSensor::new(config(DEFAULT_MAX_WAIT_US), trigger, echo, clock);

        sensor.try_measure().unwrap();
        let rose = sensor.trigger.rose_at.unwrap();
        let fell = sensor.trigger.fell_at.unwrap();
        assert!(fell - rose >= TRIGGER_PULSE_US);
    }

    #[test]
    fn test_echo_never_rises_times_out() {
        let clock = ManualClock::new(7);
        let mut sensor = RangeSensor::new(config(1_000), NoopTrigger, StuckEcho(false), clock);

        match sensor.try_measure() {
            Err(RangingError::EchoNeverRose { waited_us }) => assert!(waited_us > 1_000),
            other => panic!("expected EchoNeverRose, got {other:?}"),
        }
    }

    #[test]
    fn test_echo_stuck_high_times_out() {
        let clock = ManualClock::new(7);
        let mut sensor = RangeSensor::new(config(1_000), NoopTrigger, StuckEcho(true), clock);

        assert!(matches!(sensor.try_measure(), Err(RangingError::EchoNeverFell { .. })));
    }

    #[test]
    fn test_timeout_becomes_timeout_sample() {
        let clock = ManualClock::new(3);
        clock.set_ms(250);
        let mut sensor = RangeSensor::new(config(500), NoopTrigger, StuckEcho(false), clock);

        let sample = sensor.measure();
        assert_eq!(sample.distance, Distance::Timeout);
        assert_eq!(sample.timestamp.0, 250);
    }

    #[test]
    fn test_dead_sensor_returns_within_bound_on_real_clock() {
        let mut sensor =
            RangeSensor::new(config(DEFAULT_MAX_WAIT_US), NoopTrigger, StuckEcho(false), MonotonicClock::new());

        let started = Instant::now();
        let sample = sensor.measure();
        let elapsed = started.elapsed();

        assert!(sample.distance.is_timeout());
        // Budget is 30 ms; allow scheduler slack on busy CI hosts
        assert!(elapsed.as_millis() < 60, "measure took {elapsed:?}");
    }
}
