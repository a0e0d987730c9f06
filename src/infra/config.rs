//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::types::{Direction, SensorSide};
use crate::io::ranging::{RangeSensorConfig, DEFAULT_MAX_WAIT_US, TRIGGER_PULSE_US};
use crate::services::crossing_detector::DetectorConfig;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Door identifier included in startup logs
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "door".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SensorConfig {
    /// Readings strictly below this distance count as "object present"
    #[serde(default = "default_threshold_cm")]
    pub threshold_cm: u16,
    /// Upper bound on the echo wait, both phases together
    #[serde(default = "default_max_wait_us")]
    pub max_wait_us: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { threshold_cm: default_threshold_cm(), max_wait_us: default_max_wait_us() }
    }
}

fn default_threshold_cm() -> u16 {
    50
}

fn default_max_wait_us() -> u64 {
    DEFAULT_MAX_WAIT_US
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct SensorsConfig {
    #[serde(default)]
    pub entry: SensorConfig,
    #[serde(default)]
    pub exit: SensorConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DetectorSection {
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    #[serde(default = "default_confirm_samples")]
    pub confirm_samples: u32,
    /// Direction chosen when both sensors arm on the same tick
    #[serde(default = "default_tie_break")]
    pub tie_break: Direction,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
            confirm_samples: default_confirm_samples(),
            tie_break: default_tie_break(),
        }
    }
}

fn default_grace_ms() -> u64 {
    3000
}

fn default_confirm_samples() -> u32 {
    1
}

fn default_tie_break() -> Direction {
    Direction::Entry
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: default_poll_interval_ms() }
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DisplayConfig {
    /// How long an outcome message stays up before "System Ready" returns
    #[serde(default = "default_message_hold_ms")]
    pub message_hold_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { message_hold_ms: default_message_hold_ms() }
    }
}

fn default_message_hold_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResetConfig {
    /// Reset edges closer together than this are treated as bounce
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// One step of the simulated walker script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimStep {
    /// A person walks through in the given direction
    Walk { at_ms: u64, direction: Direction },
    /// A person stands in front of one sensor and leaves the way they came
    Linger { at_ms: u64, side: SensorSide, hold_ms: u64 },
    /// The reset button is pressed
    Reset { at_ms: u64 },
}

impl SimStep {
    pub fn at_ms(&self) -> u64 {
        match self {
            SimStep::Walk { at_ms, .. } | SimStep::Linger { at_ms, .. } | SimStep::Reset { at_ms } => {
                *at_ms
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Distance reported while a person stands in front of a sensor
    #[serde(default = "default_near_cm")]
    pub near_cm: u16,
    /// Time for a walker to move from one sensor's beam to the next
    #[serde(default = "default_stride_ms")]
    pub stride_ms: u64,
    /// Restart the script after this many milliseconds (0 runs it once)
    #[serde(default = "default_repeat_every_ms")]
    pub repeat_every_ms: u64,
    #[serde(default = "default_sim_steps")]
    pub steps: Vec<SimStep>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            near_cm: default_near_cm(),
            stride_ms: default_stride_ms(),
            repeat_every_ms: default_repeat_every_ms(),
            steps: default_sim_steps(),
        }
    }
}

fn default_near_cm() -> u16 {
    30
}

fn default_stride_ms() -> u64 {
    400
}

fn default_repeat_every_ms() -> u64 {
    30_000
}

fn default_sim_steps() -> Vec<SimStep> {
    vec![
        SimStep::Walk { at_ms: 1_000, direction: Direction::Entry },
        SimStep::Walk { at_ms: 4_000, direction: Direction::Entry },
        SimStep::Walk { at_ms: 8_000, direction: Direction::Exit },
        SimStep::Linger { at_ms: 12_000, side: SensorSide::Exit, hold_ms: 5_000 },
        SimStep::Reset { at_ms: 20_000 },
        SimStep::Walk { at_ms: 23_000, direction: Direction::Exit },
    ]
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub detector: DetectorSection,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    entry_sensor: SensorConfig,
    exit_sensor: SensorConfig,
    grace_ms: u64,
    confirm_samples: u32,
    tie_break: Direction,
    poll_interval_ms: u64,
    message_hold_ms: u64,
    reset_debounce_ms: u64,
    metrics_interval_secs: u64,
    log_format: LogFormat,
    simulation: SimulationConfig,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            site_id: toml_config.site.id,
            entry_sensor: toml_config.sensors.entry,
            exit_sensor: toml_config.sensors.exit,
            grace_ms: toml_config.detector.grace_ms,
            // Zero would arm on nothing; one is the minimum meaningful run
            confirm_samples: toml_config.detector.confirm_samples.max(1),
            tie_break: toml_config.detector.tie_break,
            poll_interval_ms: toml_config.poll.interval_ms,
            message_hold_ms: toml_config.display.message_hold_ms,
            reset_debounce_ms: toml_config.reset.debounce_ms,
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            log_format: toml_config.logging.format,
            simulation: toml_config.simulation,
            config_file,
        }
    }

    /// Determine config file path from the `--config` value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(cli_path: Option<&str>) -> Self {
        Self::load_from_path(&Self::resolve_config_path(cli_path))
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                // Logging is configured from this file, so it is not up yet
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Longest time one polling cycle can spend ranging both sensors, in ms
    pub fn worst_case_ranging_ms(&self) -> u64 {
        let per_sensor =
            |s: &SensorConfig| TRIGGER_PULSE_US.saturating_add(s.max_wait_us);
        let total_us = per_sensor(&self.entry_sensor).saturating_add(per_sensor(&self.exit_sensor));
        total_us.div_ceil(1000)
    }

    /// Poll interval actually used: never shorter than both sensors ranged in series
    pub fn effective_poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.max(self.worst_case_ranging_ms())
    }

    pub fn sensor(&self, side: SensorSide) -> &SensorConfig {
        match side {
            SensorSide::Entry => &self.entry_sensor,
            SensorSide::Exit => &self.exit_sensor,
        }
    }

    pub fn range_sensor_config(&self, side: SensorSide) -> RangeSensorConfig {
        let sensor = self.sensor(side);
        RangeSensorConfig { side, threshold_cm: sensor.threshold_cm, max_wait_us: sensor.max_wait_us }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            grace_ms: self.grace_ms,
            confirm_samples: self.confirm_samples,
            tie_break: self.tie_break,
        }
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn grace_ms(&self) -> u64 {
        self.grace_ms
    }

    pub fn confirm_samples(&self) -> u32 {
        self.confirm_samples
    }

    pub fn tie_break(&self) -> Direction {
        self.tie_break
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn message_hold_ms(&self) -> u64 {
        self.message_hold_ms
    }

    pub fn reset_debounce_ms(&self) -> u64 {
        self.reset_debounce_ms
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    pub fn simulation(&self) -> &SimulationConfig {
        &self.simulation
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the grace window
    #[cfg(test)]
    pub fn with_grace_ms(mut self, ms: u64) -> Self {
        self.grace_ms = ms;
        self
    }

    /// Builder method for tests to set the poll interval
    #[cfg(test)]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}
