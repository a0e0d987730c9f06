//! Reset button input
//!
//! The reset button is an edge-triggered input line. On a host build the
//! edge is delivered as SIGUSR1 (`kill -USR1 <pid>`). Edges are forwarded to
//! the reset handler over a bounded channel with `try_send`, so a burst of
//! presses can never block the signal listener; debounce happens in the
//! handler where the timestamps are compared.

use crate::domain::types::ResetEdge;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Queue depth between the reset line and its handler
pub const RESET_QUEUE_DEPTH: usize = 8;

/// Sending side of the reset line
#[derive(Clone)]
pub struct ResetLine {
    tx: mpsc::Sender<ResetEdge>,
}

impl ResetLine {
    pub fn new(tx: mpsc::Sender<ResetEdge>) -> Self {
        Self { tx }
    }

    /// Create a line and the receiver the reset handler consumes
    pub fn channel() -> (Self, mpsc::Receiver<ResetEdge>) {
        let (tx, rx) = mpsc::channel(RESET_QUEUE_DEPTH);
        (Self::new(tx), rx)
    }

    pub fn sender(&self) -> mpsc::Sender<ResetEdge> {
        self.tx.clone()
    }

    /// Deliver one edge; returns false if it had to be dropped
    pub fn pulse(&self) -> bool {
        match self.tx.try_send(ResetEdge::now()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // Handler is already behind on presses; one more changes nothing
                debug!("reset_edge_dropped_queue_full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("reset_edge_dropped_handler_gone");
                false
            }
        }
    }
}

/// Listen for SIGUSR1 and turn each delivery into a reset edge
#[cfg(unix)]
pub async fn run_signal_listener(
    line: ResetLine,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 =
        signal(SignalKind::user_defined1()).context("Failed to register SIGUSR1 handler")?;
    info!("reset_listener_started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("reset_listener_shutdown");
                    return Ok(());
                }
            }
            received = usr1.recv() => {
                if received.is_none() {
                    return Ok(());
                }
                debug!("reset_signal_received");
                line.pulse();
            }
        }
    }
}
