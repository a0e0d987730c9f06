//! Audio collaborator
//!
//! Plays a numbered sound file (1 = welcome, 2 = goodbye). Fire-and-forget;
//! the loop never waits for playback.

use parking_lot::Mutex;
use tracing::info;

pub trait AudioPlayer: Send + Sync {
    fn play(&self, file_id: u8);
}

/// Player that logs the requested file
#[derive(Debug, Default)]
pub struct TracingAudio;

impl AudioPlayer for TracingAudio {
    fn play(&self, file_id: u8) {
        info!(file_id = %file_id, "audio_play");
    }
}

/// Player that remembers requested files, for tests and headless runs
#[derive(Debug, Default)]
pub struct RecordingAudio {
    played: Mutex<Vec<u8>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<u8> {
        self.played.lock().clone()
    }
}

impl AudioPlayer for RecordingAudio {
    fn play(&self, file_id: u8) {
        self.played.lock().push(file_id);
    }
}
