use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use distribution_models::{EpochRange, MetricsWindow, WorkerActivity, WorkerId};
use tokio::sync::RwLock;

use crate::repositories::traits::WorkerMetricsView;
use crate::utils::crypto::CryptoUtils;

/// Serves windows that were inserted up front.
#[derive(Default)]
pub struct StaticMetricsView {
    windows: RwLock<HashMap<EpochRange, MetricsWindow>>,
}

impl StaticMetricsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, window: MetricsWindow) {
        self.windows.write().await.insert(window.range, window);
    }
}

#[async_trait]
impl WorkerMetricsView for StaticMetricsView {
    async fn activity(&self, range: &EpochRange) -> Result<MetricsWindow> {
        self.windows
            .read()
            .await
            .get(range)
            .cloned()
            .ok_or_else(|| anyhow!("no metrics recorded for {range}"))
    }
}

/// Deterministic pseudo-random activity derived from the worker id and range,
/// so every distributor computes the same rewards for the same epoch.
pub struct SyntheticMetricsView {
    workers: Vec<WorkerId>,
    genesis: DateTime<Utc>,
    seconds_per_block: u64,
    ping_interval_secs: i64,
}

impl SyntheticMetricsView {
    pub fn new(workers: Vec<WorkerId>, genesis: DateTime<Utc>, seconds_per_block: u64) -> Self {
        Self {
            workers,
            genesis,
            seconds_per_block,
            ping_interval_secs: 60,
        }
    }

    fn block_time(&self, block: u64) -> DateTime<Utc> {
        let secs = block.saturating_mul(self.seconds_per_block).min(i64::MAX as u64) as i64;
        self.genesis + Duration::seconds(secs)
    }

    fn worker_activity(&self, peer_id: &WorkerId, range: &EpochRange, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<WorkerActivity> {
        let mut input = peer_id.as_str().as_bytes().to_vec();
        input.extend_from_slice(&range.from_block.to_be_bytes());
        let seed = CryptoUtils::keccak(&input);
        let b = seed.as_bytes();
        let word = |i: usize| u32::from_be_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]) as u64;

        // one in twenty workers does not report at all
        if b[20] % 20 == 0 {
            return None;
        }

        let total_requests = 100 + word(8) % 900;
        let valid_requests = total_requests - word(12) % 10;

        // one in ten goes silent halfway through the window
        let silent_from = if b[16] % 10 == 0 {
            start + (end - start) / 2
        } else {
            end
        };
        let mut pings = Vec::new();
        let mut at = start;
        while at <= silent_from {
            pings.push(at);
            at = at + Duration::seconds(self.ping_interval_secs);
        }

        let liveness_history = b[24..].iter().map(|v| 0.85 + (*v as f64 / 255.0) * 0.15).collect();

        Some(WorkerActivity {
            peer_id: peer_id.clone(),
            bytes_sent: 1_000_000 + word(0) % 9_000_000,
            chunks_read: 100 + word(4) % 900,
            total_requests,
            valid_requests,
            pings,
            liveness_history,
        })
    }
}

#[async_trait]
impl WorkerMetricsView for SyntheticMetricsView {
    async fn activity(&self, range: &EpochRange) -> Result<MetricsWindow> {
        let start = self.block_time(range.from_block);
        let end = self.block_time(range.to_block);
        let workers = self
            .workers
            .iter()
            .filter_map(|peer| self.worker_activity(peer, range, start, end))
            .collect();

        Ok(MetricsWindow {
            range: *range,
            start,
            end,
            workers,
        })
    }
}
