use std::fs;
use std::path::{Path, PathBuf};

use distribution_models::NetworkParams;
use reward_distribution::config::DistributorConfig;
use reward_distribution::services::{RewardEngine, RewardTree};
use reward_distribution::utils::merkle::MerkleTree;
use reward_distribution::DistributionError;
use sp_core::H256;
use thiserror::Error;

use crate::config::Config;
use crate::devnet::{self, DevnetReport};
use crate::types::{BatchOutput, ComputeInput, ComputeOutput};

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error("devnet error: {0}")]
    Devnet(String),
}

pub struct DistributorCommands {
    config: Config,
}

impl DistributorCommands {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn settings(&self) -> &DistributorConfig {
        &self.config.settings
    }

    /// Compute rewards, batches and proofs for the metrics in `path`.
    pub fn compute_file(&self, path: &Path) -> Result<ComputeOutput, Error> {
        let raw = fs::read_to_string(path)?;
        let input: ComputeInput = serde_json::from_str(&raw)?;
        self.compute(input)
    }

    pub fn compute(&self, input: ComputeInput) -> Result<ComputeOutput, Error> {
        let settings = self.settings();
        let params = NetworkParams {
            bond_amount: input.bond_amount,
            epoch_seconds: input.epoch_seconds,
            target_apr: input.target_apr.unwrap_or(settings.rewards.target_apr),
        };
        let set = RewardEngine::new(settings.rewards.clone()).calculate(&input.workers, &params);
        let payable = set.payable();
        if payable.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no worker in {} earned a reward",
                input.range
            )));
        }

        let tree = RewardTree::build(input.range, &payable, settings.batching.batch_size)?;
        let batches = tree
            .batches()
            .iter()
            .map(|batch| BatchOutput {
                index: batch.index,
                leaf_hash: batch.leaf_hash,
                proof: tree.proof(batch.index).unwrap_or_default(),
                recipients: batch.recipients(),
                worker_rewards: batch.worker_rewards(),
                staker_rewards: batch.staker_rewards(),
            })
            .collect();

        Ok(ComputeOutput {
            range: tree.range(),
            root: tree.root(),
            total_batches: tree.total_batches(),
            total_workers: tree.total_workers(),
            total_rewards: tree.total_rewards(),
            cap: set.cap,
            batches,
        })
    }

    /// `proof` is a comma separated list of sibling hashes, possibly empty.
    pub fn verify_proof(root: &str, leaf: &str, proof: &str) -> Result<bool, Error> {
        let root = parse_hash(root)?;
        let leaf = parse_hash(leaf)?;
        let proof = proof
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_hash)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MerkleTree::verify(leaf, &proof, root))
    }

    /// Write the default settings to `path`.
    pub fn init_config(path: PathBuf, force: bool) -> Result<PathBuf, Error> {
        if path.exists() && !force {
            return Err(Error::Config(format!(
                "{} already exists, pass --force to overwrite",
                path.display()
            )));
        }
        let config = Config {
            path,
            settings: DistributorConfig::default(),
        };
        config.save()?;
        Ok(config.path)
    }

    pub async fn devnet(&self, epochs: Option<u64>) -> Result<DevnetReport, Error> {
        devnet::run(self.settings().clone(), epochs).await
    }
}

pub fn parse_hash(value: &str) -> Result<H256, Error> {
    let digits = value.trim().trim_start_matches("0x");
    let bytes = hex::decode(digits)
        .map_err(|e| Error::InvalidInput(format!("{value:?} is not hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(Error::InvalidInput(format!(
            "{value:?} is {} bytes, expected 32",
            bytes.len()
        )));
    }
    Ok(H256::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use distribution_models::{EpochRange, LedgerWorkerId, WorkerId, WorkerMetrics};

    fn commands() -> DistributorCommands {
        let mut settings = DistributorConfig::default();
        settings.batching.batch_size = 2;
        DistributorCommands::new(Config {
            path: PathBuf::from("unused.toml"),
            settings,
        })
    }

    fn worker(id: u64) -> WorkerMetrics {
        WorkerMetrics {
            worker_id: LedgerWorkerId(id),
            peer_id: WorkerId::new(format!("peer-{id}")),
            bytes_sent: 1_000,
            chunks_read: 100,
            total_requests: 10,
            valid_requests: 10,
            stake: 0,
            total_delegated_stake: 0,
            liveness_factor: 1.0,
            tenure_factor: 1.0,
        }
    }

    fn input(workers: Vec<WorkerMetrics>) -> ComputeInput {
        ComputeInput {
            range: EpochRange::new(0, 100).unwrap(),
            bond_amount: 100_000 * 10u128.pow(18),
            epoch_seconds: 7 * 24 * 60 * 60,
            target_apr: None,
            workers,
        }
    }

    #[test]
    fn computed_proofs_verify_against_the_root() {
        let output = commands().compute(input((1..=5).map(worker).collect())).unwrap();
        assert_eq!(output.total_batches, 3);
        assert_eq!(output.total_workers, 5);
        assert!(output.total_rewards <= output.cap);

        let root = format!("{:?}", output.root);
        for batch in &output.batches {
            let proof: Vec<String> = batch.proof.iter().map(|h| format!("{h:?}")).collect();
            let leaf = format!("{:?}", batch.leaf_hash);
            assert!(DistributorCommands::verify_proof(&root, &leaf, &proof.join(",")).unwrap());
        }
    }

    #[test]
    fn compute_rejects_epochs_without_rewards() {
        assert!(matches!(
            commands().compute(input(Vec::new())),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_hash_checks_length() {
        assert!(parse_hash("0x1234").is_err());
        assert!(parse_hash("zz").is_err());
        let hash = H256::repeat_byte(0xab);
        assert_eq!(parse_hash(&format!("{hash:?}")).unwrap(), hash);
    }
}
