use serde::{Deserialize, Serialize};
use sp_core::H256;

use crate::epoch::EpochRange;
use crate::Address;

/// Ledger-side record of a Merkle root proposed for an epoch range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub range: EpochRange,
    pub exists: bool,
    pub merkle_root: H256,
    pub total_batches: u32,
    pub processed_batches: u32,
    pub approval_count: u32,
    /// Distributor that submitted the root, when known.
    pub committer: Option<Address>,
    pub metadata_link: String,
}

impl Commitment {
    /// Placeholder returned by the ledger for a range nobody committed.
    pub fn absent(range: EpochRange) -> Self {
        Self {
            range,
            exists: false,
            merkle_root: H256::zero(),
            total_batches: 0,
            processed_batches: 0,
            approval_count: 0,
            committer: None,
            metadata_link: String::new(),
        }
    }

    pub fn is_fully_processed(&self) -> bool {
        self.exists && self.processed_batches >= self.total_batches
    }
}
