use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::epoch::EpochRange;
use crate::worker::WorkerId;

/// Raw activity of one worker as reported by the analytics store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerActivity {
    pub peer_id: WorkerId,
    pub bytes_sent: u64,
    pub chunks_read: u64,
    pub total_requests: u64,
    pub valid_requests: u64,
    /// Ping timestamps observed inside the window, in any order.
    pub pings: Vec<DateTime<Utc>>,
    /// Liveness of the worker in previous epochs, most recent first.
    #[serde(default)]
    pub liveness_history: Vec<f64>,
}

/// Activity of all workers seen during an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsWindow {
    pub range: EpochRange,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub workers: Vec<WorkerActivity>,
}

impl MetricsWindow {
    /// Length of the window in whole seconds; zero for inverted windows.
    pub fn duration_secs(&self) -> u64 {
        (self.end - self.start).num_seconds().max(0) as u64
    }
}
