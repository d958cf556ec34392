//! Per-worker reward formula.
//!
//! `yield = rMax * dLiveness * dTraffic * dTenure`, paid as
//! `yield * (bond + stake/2)` to the worker and `yield * stake/2` to its
//! delegators. Coefficients are quantized to the configured precision before
//! they are multiplied into token amounts.

use distribution_models::{LedgerWorkerId, NetworkParams, RewardAssignment, WorkerMetrics};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RewardConfig;
use crate::utils::fixed_point::{mul_div, quantize, quantize_unit};

pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Dimensionless factors that shaped one worker's reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub worker_id: LedgerWorkerId,
    pub traffic: f64,
    pub liveness: f64,
    pub tenure: f64,
}

/// Rewards of every worker for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardSet {
    /// Sorted by ledger worker id.
    pub assignments: Vec<RewardAssignment>,
    pub coefficients: Vec<Coefficients>,
    /// Maximum per-epoch yield, fixed-point.
    pub r_max: u128,
    /// Upper bound the total never exceeds.
    pub cap: u128,
    pub total: u128,
}

impl RewardSet {
    /// Assignments that move any tokens.
    pub fn payable(&self) -> Vec<RewardAssignment> {
        self.assignments
            .iter()
            .filter(|a| !a.is_zero())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RewardEngine {
    config: RewardConfig,
}

impl RewardEngine {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    fn precision(&self) -> u128 {
        self.config.precision as u128
    }

    /// `targetApr * epochSeconds / secondsPerYear`, fixed-point.
    pub fn r_max(&self, params: &NetworkParams) -> u128 {
        let apr = quantize(params.target_apr, self.precision());
        mul_div(apr, params.epoch_seconds as u128, SECONDS_PER_YEAR as u128)
    }

    /// Piecewise-linear liveness coefficient of an uptime ratio.
    pub fn liveness_coefficient(uptime: f64) -> f64 {
        let coefficient = if !uptime.is_finite() || uptime < 0.8 {
            0.0
        } else if uptime < 0.9 {
            9.0 * uptime - 7.2
        } else if uptime < 0.95 {
            2.0 * uptime - 0.9
        } else {
            1.0
        };
        coefficient.clamp(0.0, 1.0)
    }

    /// `min(1, (T(w) / totalT / stakeShare(w)) ^ alpha)` for every worker.
    pub fn traffic_coefficients(&self, metrics: &[WorkerMetrics], bond: u128) -> Vec<f64> {
        let total_bytes: f64 = metrics.iter().map(|m| m.bytes_sent as f64).sum();
        let total_chunks: f64 = metrics.iter().map(|m| m.chunks_read as f64).sum();
        let total_supply: f64 = metrics
            .iter()
            .map(|m| bond.saturating_add(m.stake) as f64)
            .sum();

        let weights: Vec<f64> = metrics
            .iter()
            .map(|m| {
                let bytes = ratio(m.bytes_sent as f64, total_bytes);
                let chunks = ratio(m.chunks_read as f64, total_chunks);
                (bytes * chunks).sqrt()
            })
            .collect();
        let total_weight: f64 = weights.iter().sum();

        metrics
            .iter()
            .zip(&weights)
            .map(|(m, weight)| {
                let traffic_share = ratio(*weight, total_weight);
                let stake_share = ratio(bond.saturating_add(m.stake) as f64, total_supply);
                if traffic_share <= 0.0 || stake_share <= 0.0 {
                    return 0.0;
                }
                (traffic_share / stake_share).powf(self.config.alpha).min(1.0)
            })
            .collect()
    }

    pub fn calculate(&self, metrics: &[WorkerMetrics], params: &NetworkParams) -> RewardSet {
        let mut metrics: Vec<WorkerMetrics> = metrics
            .iter()
            .filter(|m| match m.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "dropping worker with invalid metrics");
                    false
                }
            })
            .cloned()
            .collect();
        // float sums depend on order
        metrics.sort_by_key(|m| m.worker_id);

        let precision = self.precision();
        let bond = params.bond_amount;
        let r_max = self.r_max(params);
        let traffic = self.traffic_coefficients(&metrics, bond);

        let mut assignments = Vec::with_capacity(metrics.len());
        let mut coefficients = Vec::with_capacity(metrics.len());
        let mut total_supply: u128 = 0;

        for (m, d_traffic) in metrics.iter().zip(traffic) {
            total_supply = total_supply.saturating_add(bond.saturating_add(m.stake));

            let d_liveness = Self::liveness_coefficient(m.liveness_factor);
            let d_tenure = m.tenure_factor;

            let actual_yield = [d_liveness, d_traffic, d_tenure]
                .iter()
                .fold(r_max, |acc, c| mul_div(acc, quantize_unit(*c, precision), precision));

            let half_stake = m.stake / 2;
            assignments.push(RewardAssignment {
                worker_id: m.worker_id,
                peer_id: m.peer_id.clone(),
                worker_reward: mul_div(actual_yield, bond.saturating_add(half_stake), precision),
                staker_reward: mul_div(actual_yield, half_stake, precision),
            });
            coefficients.push(Coefficients {
                worker_id: m.worker_id,
                traffic: d_traffic,
                liveness: d_liveness,
                tenure: d_tenure,
            });
        }

        let mut cap = mul_div(r_max, total_supply, precision);
        let mut total: u128 = assignments.iter().map(RewardAssignment::total).sum();

        if let Some(unlocked) = self.config.unlocked_reward_cap {
            if total > unlocked {
                debug!(total, unlocked, "scaling rewards down to the unlocked cap");
                for a in &mut assignments {
                    a.worker_reward = mul_div(a.worker_reward, unlocked, total);
                    a.staker_reward = mul_div(a.staker_reward, unlocked, total);
                }
                total = assignments.iter().map(RewardAssignment::total).sum();
            }
            cap = cap.min(unlocked);
        }

        RewardSet {
            assignments,
            coefficients,
            r_max,
            cap,
            total,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribution_models::WorkerId;

    const P: u128 = 1_000_000_000;

    fn worker(id: u64, bytes: u64, chunks: u64, stake: u128) -> WorkerMetrics {
        WorkerMetrics {
            worker_id: LedgerWorkerId(id),
            peer_id: WorkerId::new(format!("peer-{id}")),
            bytes_sent: bytes,
            chunks_read: chunks,
            total_requests: 10,
            valid_requests: 10,
            stake,
            total_delegated_stake: stake,
            liveness_factor: 1.0,
            tenure_factor: 1.0,
        }
    }

    fn params(bond: u128) -> NetworkParams {
        NetworkParams {
            bond_amount: bond,
            epoch_seconds: SECONDS_PER_YEAR / 10,
            target_apr: 0.2,
        }
    }

    #[test]
    fn r_max_scales_apr_to_epoch_length() {
        let engine = RewardEngine::new(RewardConfig::default());
        assert_eq!(engine.r_max(&params(100)), 20_000_000);
    }

    #[test]
    fn liveness_is_piecewise_linear() {
        assert_eq!(RewardEngine::liveness_coefficient(0.79), 0.0);
        assert!((RewardEngine::liveness_coefficient(0.85) - 0.45).abs() < 1e-9);
        assert!((RewardEngine::liveness_coefficient(0.9) - 0.9).abs() < 1e-9);
        assert!((RewardEngine::liveness_coefficient(0.93) - 0.96).abs() < 1e-9);
        assert_eq!(RewardEngine::liveness_coefficient(0.95), 1.0);
        assert_eq!(RewardEngine::liveness_coefficient(f64::NAN), 0.0);
    }

    #[test]
    fn no_traffic_means_zero_traffic_coefficient() {
        let engine = RewardEngine::new(RewardConfig::default());
        let coefficients = engine.traffic_coefficients(&[worker(1, 0, 0, 0), worker(2, 0, 0, 0)], 100);
        assert_eq!(coefficients, vec![0.0, 0.0]);
    }

    #[test]
    fn zero_bond_and_stake_does_not_divide_by_zero() {
        let engine = RewardEngine::new(RewardConfig::default());
        let set = engine.calculate(&[worker(1, 10, 10, 0)], &params(0));
        assert_eq!(set.total, 0);
        assert_eq!(set.cap, 0);
    }

    #[test]
    fn heavy_traffic_is_capped_at_one() {
        let engine = RewardEngine::new(RewardConfig::default());
        let coefficients = engine.traffic_coefficients(&[worker(1, 90, 90, 0), worker(2, 10, 10, 0)], 100);
        assert_eq!(coefficients[0], 1.0);
        assert!(coefficients[1] < 1.0);
        assert!(coefficients[1] > 0.0);
    }

    #[test]
    fn rewards_split_stake_between_worker_and_delegators() {
        let engine = RewardEngine::new(RewardConfig::default());
        let set = engine.calculate(&[worker(1, 10, 10, 40)], &params(100));
        let a = &set.assignments[0];
        // rMax = 0.02; worker gets 0.02 * (100 + 20), delegators 0.02 * 20
        assert_eq!(a.worker_reward, mul_div(20_000_000, 120, P));
        assert_eq!(a.staker_reward, mul_div(20_000_000, 20, P));
    }

    #[test]
    fn unlocked_cap_scales_rewards_down() {
        let config = RewardConfig {
            unlocked_reward_cap: Some(1_000),
            ..RewardConfig::default()
        };
        let engine = RewardEngine::new(config);
        let bond = 1_000_000;
        let set = engine.calculate(&[worker(1, 10, 10, 0), worker(2, 10, 10, 0)], &params(bond));
        assert!(set.total <= 1_000);
        assert_eq!(set.cap, 1_000);
        assert_eq!(set.assignments[0].worker_reward, set.assignments[1].worker_reward);
    }

    #[test]
    fn assignments_are_sorted_by_ledger_id() {
        let engine = RewardEngine::new(RewardConfig::default());
        let set = engine.calculate(&[worker(9, 1, 1, 0), worker(3, 1, 1, 0), worker(5, 1, 1, 0)], &params(100));
        let ids: Vec<u64> = set.assignments.iter().map(|a| a.worker_id.0).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
