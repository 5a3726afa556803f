//! Runs an emulation on a background thread.
//!
//! The caller keeps the [`EmulationHandle`] and polls it for progress
//! while the run proceeds, then joins it for the output. Polling is
//! optional: unread progress never holds the run back.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use emulator_common::EmulationResult;
use tracing::debug;

use crate::progress::{progress_channel, ProgressEvent, ProgressReceiver, DEFAULT_PROGRESS_CAPACITY};
use crate::scheduler::{Emulation, EmulationOutput};

/// A run in flight.
#[derive(Debug)]
pub struct EmulationHandle {
    thread: JoinHandle<EmulationResult<EmulationOutput>>,
    progress: ProgressReceiver,
}

/// Starts `emulation` on its own thread.
#[must_use]
pub fn spawn_emulation(emulation: Emulation) -> EmulationHandle {
    let (tx, rx) = progress_channel(DEFAULT_PROGRESS_CAPACITY);
    let thread = thread::spawn(move || {
        debug!("Background emulation started");
        emulation.run_with_progress(&tx)
    });
    EmulationHandle {
        thread,
        progress: rx,
    }
}

impl EmulationHandle {
    /// Returns progress events queued since the last poll.
    #[must_use]
    pub fn poll(&self) -> Vec<ProgressEvent> {
        self.progress.poll()
    }

    /// Waits up to `timeout` for the next progress event.
    pub fn next_event(&self, timeout: Duration) -> Option<ProgressEvent> {
        self.progress.recv_timeout(timeout)
    }

    /// Returns true once the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the run ends.
    ///
    /// A panic inside the run is resumed on the calling thread.
    pub fn wait(self) -> EmulationResult<EmulationOutput> {
        match self.thread.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}
