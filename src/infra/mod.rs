//! Infrastructure - configuration, metrics, and time
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults)
//! - `metrics` - Lock-free metrics collection
//! - `clock` - Monotonic time sources shared by ranging and detection

pub mod clock;
pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Config, LogFormat, SimStep, SimulationConfig};
pub use metrics::Metrics;
