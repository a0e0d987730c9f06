//! Reset handler - consumes reset edges off the polling path
//!
//! Same shape as a command worker: edges arrive on an mpsc channel, each one
//! is debounced against the last accepted edge and then applied to the shared
//! door state. After a reset the system row shows "System Reset" for the
//! message hold time and then returns to "System Ready".

use crate::domain::types::ResetEdge;
use crate::infra::metrics::Metrics;
use crate::io::display::{StatusDisplay, MSG_READY, MSG_RESET, STATUS_X, SYSTEM_ROW_Y};
use crate::services::door::{DoorCounter, ResetReport};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep_until;
use tracing::{debug, info};

pub struct ResetHandler {
    door: DoorCounter,
    display: Arc<dyn StatusDisplay>,
    metrics: Arc<Metrics>,
    debounce: Duration,
    message_hold: Duration,
    last_accepted: Option<Instant>,
}

impl ResetHandler {
    pub fn new(
        door: DoorCounter,
        display: Arc<dyn StatusDisplay>,
        metrics: Arc<Metrics>,
        debounce_ms: u64,
        message_hold_ms: u64,
    ) -> Self {
        Self {
            door,
            display,
            metrics,
            debounce: Duration::from_millis(debounce_ms),
            message_hold: Duration::from_millis(message_hold_ms),
            last_accepted: None,
        }
    }

    /// Apply one edge; `None` if it fell inside the debounce window
    pub fn fire(&mut self, edge: ResetEdge) -> Option<ResetReport> {
        if let Some(last) = self.last_accepted {
            let since = edge.at.saturating_duration_since(last);
            if since < self.debounce {
                debug!(since_ms = %since.as_millis(), "reset_bounce_ignored");
                self.metrics.record_reset_bounce();
                return None;
            }
        }
        self.last_accepted = Some(edge.at);

        let report = self.door.reset();
        self.metrics.record_reset(report.discarded_crossing);

        self.display.display(MSG_RESET, STATUS_X, SYSTEM_ROW_Y);
        let s = report.snapshot;
        self.display.update_counters(s.entries, s.current, s.exits);

        info!(
            previous_entries = %report.previous.entries,
            previous_exits = %report.previous.exits,
            previous_current = %report.previous.current,
            discarded_crossing = %report.discarded_crossing,
            "reset_applied"
        );
        Some(report)
    }

    /// Process edges until the channel closes or shutdown is signalled
    pub async fn run(mut self, mut rx: mpsc::Receiver<ResetEdge>, mut shutdown: watch::Receiver<bool>) {
        info!(debounce_ms = %self.debounce.as_millis(), "reset_handler_started");
        let mut restore_at: Option<tokio::time::Instant> = None;

        loop {
            let restore = async move {
                match restore_at {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                edge = rx.recv() => {
                    let Some(edge) = edge else { break };
                    if self.fire(edge).is_some() {
                        restore_at = Some(tokio::time::Instant::now() + self.message_hold);
                    }
                }
                _ = restore => {
                    self.display.display(MSG_READY, STATUS_X, SYSTEM_ROW_Y);
                    restore_at = None;
                }
            }
        }

        info!("reset_handler_stopped");
    }
}
