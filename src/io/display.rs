//! Display collaborator
//!
//! The status panel shows one message line and the three counters. Rendering
//! is someone else's job; the loop only calls these two methods, and both are
//! best-effort with no return value.

use parking_lot::Mutex;
use tracing::info;

/// Where status messages go
pub const STATUS_X: u16 = 10;
/// Row used for system messages (ready, reset)
pub const SYSTEM_ROW_Y: u16 = 10;
/// Row used for crossing outcomes
pub const OUTCOME_ROW_Y: u16 = 50;

pub const MSG_READY: &str = "System Ready";
pub const MSG_RESET: &str = "System Reset";

pub trait StatusDisplay: Send + Sync {
    fn display(&self, message: &str, x: u16, y: u16);
    fn update_counters(&self, entries: u64, current: u64, exits: u64);
}

/// Display that writes every call to the log
#[derive(Debug, Default)]
pub struct TracingDisplay;

impl StatusDisplay for TracingDisplay {
    fn display(&self, message: &str, x: u16, y: u16) {
        info!(message = %message, x = %x, y = %y, "display_message");
    }

    fn update_counters(&self, entries: u64, current: u64, exits: u64) {
        info!(entries = %entries, current = %current, exits = %exits, "display_counters");
    }
}

/// One call received by a `RecordingDisplay`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Message { text: String, x: u16, y: u16 },
    Counters { entries: u64, current: u64, exits: u64 },
}

/// Display that keeps every call in memory, for tests and headless runs
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    calls: Mutex<Vec<DisplayCall>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.lock().clone()
    }

    /// Message texts only, in call order
    pub fn messages(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DisplayCall::Message { text, .. } => Some(text.clone()),
                DisplayCall::Counters { .. } => None,
            })
            .collect()
    }

    /// Most recent counter update as (entries, current, exits)
    pub fn last_counters(&self) -> Option<(u64, u64, u64)> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            DisplayCall::Counters { entries, current, exits } => Some((*entries, *current, *exits)),
            DisplayCall::Message { .. } => None,
        })
    }
}

impl StatusDisplay for RecordingDisplay {
    fn display(&self, message: &str, x: u16, y: u16) {
        self.calls.lock().push(DisplayCall::Message { text: message.to_string(), x, y });
    }

    fn update_counters(&self, entries: u64, current: u64, exits: u64) {
        self.calls.lock().push(DisplayCall::Counters { entries, current, exits });
    }
}
