pub mod commitment;
pub mod encoding;
pub mod epoch;
pub mod error;
pub mod metrics;
pub mod reward;
pub mod status;
pub mod worker;

pub use commitment::Commitment;
pub use epoch::EpochRange;
pub use error::ModelError;
pub use metrics::{MetricsWindow, WorkerActivity};
pub use reward::{NetworkParams, RewardAssignment};
pub use status::{DistributionState, DistributionStatus};
pub use worker::{LedgerWorkerId, WorkerId, WorkerMetrics};

/// Ethereum-style account of a distributor.
pub type Address = sp_core::H160;

/// Hash of a submitted ledger transaction.
pub type TxHash = sp_core::H256;

