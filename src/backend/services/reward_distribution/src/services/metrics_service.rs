use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use distribution_models::{LedgerWorkerId, MetricsWindow, WorkerActivity, WorkerMetrics};
use tracing::{debug, warn};

use crate::config::RewardConfig;
use crate::repositories::traits::ChainGateway;

/// Share of the window a worker was reachable.
///
/// Gaps between consecutive pings (and between the window edges and the
/// first/last ping) that exceed `threshold` count as downtime in full. A
/// worker that never pinged is offline for the whole window.
pub fn uptime_ratio(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    pings: &[DateTime<Utc>],
    threshold: Duration,
) -> f64 {
    let window = (end - start).num_milliseconds();
    if window <= 0 {
        return 0.0;
    }

    let mut pings: Vec<DateTime<Utc>> = pings
        .iter()
        .copied()
        .filter(|p| *p >= start && *p <= end)
        .collect();
    if pings.is_empty() {
        return 0.0;
    }
    pings.sort();

    let threshold = threshold.as_millis() as i64;
    let mut offline = 0i64;
    let mut previous = start;
    for ping in pings.iter().copied().chain(std::iter::once(end)) {
        let gap = (ping - previous).num_milliseconds();
        if gap > threshold {
            offline += gap;
        }
        previous = ping;
    }

    (1.0 - offline as f64 / window as f64).clamp(0.0, 1.0)
}

/// Tenure bonus from prior-epoch liveness, most recent first.
///
/// Starts at 0.5 and grows by 0.1 for every two of the last `window` epochs
/// with liveness of at least 0.9.
pub fn tenure_factor(history: &[f64], window: usize) -> f64 {
    let healthy = history.iter().take(window).filter(|l| **l >= 0.9).count();
    (0.5 + 0.1 * (healthy / 2) as f64).min(1.0)
}

/// Turns analytics activity into reward inputs, joining in ledger identity
/// and stake.
#[derive(Debug, Clone)]
pub struct MetricsService {
    config: RewardConfig,
}

impl MetricsService {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn liveness(&self, window: &MetricsWindow, activity: &WorkerActivity) -> f64 {
        uptime_ratio(
            window.start,
            window.end,
            &activity.pings,
            Duration::from_secs(self.config.offline_threshold_secs),
        )
    }

    pub fn tenure(&self, activity: &WorkerActivity) -> f64 {
        tenure_factor(&activity.liveness_history, self.config.tenure_window)
    }

    /// Workers without a ledger id are excluded. Stake lookups that fail fall
    /// back to zero for that worker only.
    pub async fn collect<G>(&self, gateway: &G, window: &MetricsWindow) -> Result<Vec<WorkerMetrics>>
    where
        G: ChainGateway + ?Sized,
    {
        let mut seen = HashSet::new();
        let mut resolved: Vec<(LedgerWorkerId, &WorkerActivity)> = Vec::with_capacity(window.workers.len());

        for activity in &window.workers {
            match gateway.worker_id_of(&activity.peer_id).await? {
                Some(id) if seen.insert(id) => resolved.push((id, activity)),
                Some(id) => warn!(peer = %activity.peer_id, worker = %id, "duplicate activity record ignored"),
                None => warn!(peer = %activity.peer_id, "worker not registered on the ledger, excluded"),
            }
        }

        let ids: Vec<LedgerWorkerId> = resolved.iter().map(|(id, _)| *id).collect();
        let stakes = gateway.stakes(&ids).await;

        let mut metrics = Vec::with_capacity(resolved.len());
        for (id, activity) in resolved {
            let total_delegated_stake = match stakes.get(&id) {
                Some(Ok(stake)) => *stake,
                Some(Err(e)) => {
                    warn!(worker = %id, error = %e, "stake lookup failed, counting zero stake");
                    0
                }
                None => {
                    warn!(worker = %id, "stake missing from lookup, counting zero stake");
                    0
                }
            };
            let stake = match self.config.delegation_cap {
                Some(cap) => total_delegated_stake.min(cap),
                None => total_delegated_stake,
            };

            let m = WorkerMetrics {
                worker_id: id,
                peer_id: activity.peer_id.clone(),
                bytes_sent: activity.bytes_sent,
                chunks_read: activity.chunks_read,
                total_requests: activity.total_requests,
                valid_requests: activity.valid_requests,
                stake,
                total_delegated_stake,
                liveness_factor: self.liveness(window, activity),
                tenure_factor: self.tenure(activity),
            };
            if let Err(e) = m.validate() {
                warn!(error = %e, "dropping worker with inconsistent metrics");
                continue;
            }
            metrics.push(m);
        }

        debug!(range = %window.range, workers = metrics.len(), "collected worker metrics");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    const THRESHOLD: Duration = Duration::from_secs(65);

    #[test]
    fn regular_pings_mean_full_uptime() {
        let pings: Vec<_> = (0..=10).map(|i| at(i * 60)).collect();
        assert_eq!(uptime_ratio(at(0), at(600), &pings, THRESHOLD), 1.0);
    }

    #[test]
    fn no_pings_mean_zero_uptime() {
        assert_eq!(uptime_ratio(at(0), at(600), &[], THRESHOLD), 0.0);
    }

    #[test]
    fn long_gaps_count_as_downtime() {
        // online for the first 300s, silent afterwards
        let pings: Vec<_> = (0..=5).map(|i| at(i * 60)).collect();
        let uptime = uptime_ratio(at(0), at(600), &pings, THRESHOLD);
        assert!((uptime - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unordered_and_out_of_window_pings_are_tolerated() {
        let pings = vec![at(600), at(-100), at(300), at(0), at(900)];
        let uptime = uptime_ratio(at(0), at(600), &pings, Duration::from_secs(400));
        assert_eq!(uptime, 1.0);
    }

    #[test]
    fn empty_window_is_offline() {
        assert_eq!(uptime_ratio(at(10), at(10), &[at(10)], THRESHOLD), 0.0);
    }

    #[test]
    fn tenure_grows_with_healthy_history() {
        assert_eq!(tenure_factor(&[], 10), 0.5);
        assert_eq!(tenure_factor(&[0.95], 10), 0.5);
        assert!((tenure_factor(&[0.95, 0.91, 0.5, 0.99], 10) - 0.6).abs() < 1e-9);
        assert_eq!(tenure_factor(&[1.0; 20], 10), 1.0);
        assert!((tenure_factor(&[1.0; 20], 4) - 0.7).abs() < 1e-9);
    }
}
