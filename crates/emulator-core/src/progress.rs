//! Progress reporting.
//!
//! A run (or a batch) reports `Start`, any number of `Update`s, then a
//! terminal `Done`. Updates are dropped once `capacity` events are queued,
//! so a reader that falls behind only loses updates. Start and Done never
//! wait for the reader and are always delivered.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Default number of queued events past which updates are dropped.
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// Position of a long-running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Units done.
    pub current: u64,
    /// Units in total.
    pub length: u64,
    /// Human-readable message.
    pub msg: String,
}

impl Progress {
    /// Creates a progress record.
    #[must_use]
    pub fn new(current: u64, length: u64, msg: impl Into<String>) -> Self {
        Self {
            current,
            length,
            msg: msg.into(),
        }
    }

    /// Returns completion in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.length == 0 {
            1.0
        } else {
            (self.current as f64 / self.length as f64).min(1.0)
        }
    }
}

/// One progress message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Job started.
    Start(Progress),
    /// Job advanced.
    Update(Progress),
    /// Job finished; nothing follows.
    Done,
}

impl ProgressEvent {
    /// Returns true for the terminal event.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the wire form: `{"start": {...}}`, `{"update": {...}}` or `null`.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Start(progress) => json!({ "start": progress }),
            Self::Update(progress) => json!({ "update": progress }),
            Self::Done => Value::Null,
        }
    }
}

/// Creates a connected sender and receiver.
#[must_use]
pub fn progress_channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = unbounded();
    let sender = ProgressSender {
        tx: Some(tx),
        capacity: capacity.max(4),
    };
    (sender, ProgressReceiver { rx })
}

/// Producer side. Cloned once per worker.
#[derive(Debug, Clone, Default)]
pub struct ProgressSender {
    tx: Option<Sender<ProgressEvent>>,
    capacity: usize,
}

impl ProgressSender {
    /// Creates a sender that discards everything.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            tx: None,
            capacity: 0,
        }
    }

    /// Reports the start of a job.
    pub fn start(&self, length: u64, msg: impl Into<String>) {
        self.send_reliable(ProgressEvent::Start(Progress::new(0, length, msg)));
    }

    /// Reports progress. Dropped if the reader is `capacity` events behind.
    pub fn update(&self, current: u64, length: u64, msg: impl Into<String>) {
        if let Some(tx) = &self.tx {
            if tx.len() < self.capacity {
                let _ = tx.send(ProgressEvent::Update(Progress::new(current, length, msg)));
            }
        }
    }

    /// Reports the end of a job.
    pub fn done(&self) {
        self.send_reliable(ProgressEvent::Done);
    }

    /// Never blocks: the channel itself is unbounded.
    fn send_reliable(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }
}

/// Consumer side, polled by the caller.
#[derive(Debug, Clone)]
pub struct ProgressReceiver {
    rx: Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Returns every event queued right now.
    #[must_use]
    pub fn poll(&self) -> Vec<ProgressEvent> {
        self.rx.try_iter().collect()
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout or when every sender is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ProgressEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
