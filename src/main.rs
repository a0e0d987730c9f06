//! Door occupancy counter
//!
//! Counts people entering and leaving a room through one doorway using two
//! ultrasonic ranging sensors, one on each side of the door.
//!
//! Module structure:
//! - `domain/` - Core types (Tick, Sample, Presence, Crossing)
//! - `io/` - Ranging driver, simulated sensors, reset line, display, audio
//! - `services/` - Detector, counters, polling loop, reset handler
//! - `infra/` - Config, Clock, Metrics

use clap::Parser;
use door_counter::domain::types::SensorSide;
use door_counter::infra::{Config, LogFormat, Metrics, MonotonicClock};
use door_counter::io::{
    simulated_sensor, AudioPlayer, RangeSensor, ResetLine, SimulatedDoorway, StatusDisplay,
    TracingAudio, TracingDisplay,
};
use door_counter::services::{CounterLoop, DoorCounter, ResetHandler};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Door occupancy counter
#[derive(Parser, Debug)]
#[command(name = "door-counter", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}

fn init_tracing(format: LogFormat) {
    // Default: INFO, use RUST_LOG=debug for per-cycle detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref());

    init_tracing(config.log_format());

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        git_hash = %env!("GIT_HASH"),
        "door-counter starting"
    );
    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        entry_threshold_cm = %config.sensor(SensorSide::Entry).threshold_cm,
        exit_threshold_cm = %config.sensor(SensorSide::Exit).threshold_cm,
        grace_ms = %config.grace_ms(),
        confirm_samples = %config.confirm_samples(),
        tie_break = %config.tie_break().as_str(),
        poll_interval_ms = %config.effective_poll_interval_ms(),
        "config_loaded"
    );
    if config.effective_poll_interval_ms() > config.poll_interval_ms() {
        warn!(
            configured_ms = %config.poll_interval_ms(),
            worst_case_ranging_ms = %config.worst_case_ranging_ms(),
            "poll_interval_raised"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let display: Arc<dyn StatusDisplay> = Arc::new(TracingDisplay);
    let audio: Arc<dyn AudioPlayer> = Arc::new(TracingAudio);
    let metrics = Arc::new(Metrics::new());
    let door = DoorCounter::new(config.detector_config());

    // Simulated sensors on the same clock the ranging driver times echoes with
    let clock = MonotonicClock::new();
    let (entry_trigger, entry_echo, entry_target) = simulated_sensor(clock);
    let (exit_trigger, exit_echo, exit_target) = simulated_sensor(clock);
    let entry_sensor =
        RangeSensor::new(config.range_sensor_config(SensorSide::Entry), entry_trigger, entry_echo, clock);
    let exit_sensor =
        RangeSensor::new(config.range_sensor_config(SensorSide::Exit), exit_trigger, exit_echo, clock);

    // Reset line: SIGUSR1 and the simulated doorway both feed the handler
    let (reset_line, reset_rx) = ResetLine::channel();
    let doorway = SimulatedDoorway::new(entry_target, exit_target, config.simulation().clone())
        .with_reset_tx(reset_line.sender());
    let sim_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        doorway.run(sim_shutdown).await;
    });

    #[cfg(unix)]
    {
        let line = reset_line.clone();
        let listener_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = door_counter::io::reset_line::run_signal_listener(line, listener_shutdown).await {
                tracing::error!(error = %e, "reset listener error");
            }
        });
    }
    drop(reset_line);

    let reset_handler = ResetHandler::new(
        door.clone(),
        display.clone(),
        metrics.clone(),
        config.reset_debounce_ms(),
        config.message_hold_ms(),
    );
    let reset_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        reset_handler.run(reset_rx, reset_shutdown).await;
    });

    // Start metrics reporter (lock-free reads with full summary)
    let metrics_clone = metrics.clone();
    let metrics_door = door.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            let summary = metrics_clone.report(metrics_door.snapshot().current);
            summary.log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let counter = CounterLoop::new(
        entry_sensor,
        exit_sensor,
        door.clone(),
        display,
        audio,
        metrics.clone(),
        config.effective_poll_interval_ms(),
        config.message_hold_ms(),
    );
    counter.run(shutdown_rx).await;

    let final_counts = door.snapshot();
    metrics.report(final_counts.current).log();
    info!(
        entries = %final_counts.entries,
        exits = %final_counts.exits,
        current = %final_counts.current,
        "door-counter shutdown complete"
    );
    Ok(())
}
