use distribution_models::encoding::append_words;
use distribution_models::LedgerWorkerId;
use sp_core::H256;

use crate::utils::errors::{DistributionError, Result};

pub struct CryptoUtils;

impl CryptoUtils {
    pub fn keccak(data: &[u8]) -> H256 {
        sp_core::keccak_256(data).into()
    }

    /// Hash two nodes after ordering them by byte value, so a proof does not
    /// need to carry left/right positions. The settlement ledger verifies
    /// proofs the same way.
    pub fn hash_pair(a: &H256, b: &H256) -> H256 {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let mut input = Vec::with_capacity(64);
        input.extend_from_slice(low.as_bytes());
        input.extend_from_slice(high.as_bytes());

        Self::keccak(&input)
    }

    pub fn verify_merkle_proof(root: H256, proof: &[H256], leaf: H256) -> bool {
        let computed = proof
            .iter()
            .fold(leaf, |current, sibling| Self::hash_pair(&current, sibling));

        computed == root
    }

    /// Canonical batch encoding: recipients, then worker rewards, then staker
    /// rewards, each value as a 32-byte word. Order is preserved, never sorted.
    pub fn encode_batch(
        recipients: &[LedgerWorkerId],
        worker_rewards: &[u128],
        staker_rewards: &[u128],
    ) -> Result<Vec<u8>> {
        if recipients.len() != worker_rewards.len() || recipients.len() != staker_rewards.len() {
            return Err(DistributionError::InvalidInput(format!(
                "batch columns differ in length: {} recipients, {} worker rewards, {} staker rewards",
                recipients.len(),
                worker_rewards.len(),
                staker_rewards.len()
            )));
        }

        let mut out = Vec::with_capacity(recipients.len() * 96);
        append_words(&mut out, recipients.iter().map(|id| id.0 as u128));
        append_words(&mut out, worker_rewards.iter().copied());
        append_words(&mut out, staker_rewards.iter().copied());
        Ok(out)
    }

    pub fn leaf_hash(
        recipients: &[LedgerWorkerId],
        worker_rewards: &[u128],
        staker_rewards: &[u128],
    ) -> Result<H256> {
        let encoded = Self::encode_batch(recipients, worker_rewards, staker_rewards)?;
        Ok(Self::keccak(&encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_hash_ignores_argument_order() {
        let a = CryptoUtils::keccak(b"a");
        let b = CryptoUtils::keccak(b"b");
        assert_eq!(CryptoUtils::hash_pair(&a, &b), CryptoUtils::hash_pair(&b, &a));
    }

    #[test]
    fn encoding_is_order_sensitive() {
        let ids = [LedgerWorkerId(1), LedgerWorkerId(2)];
        let swapped = [LedgerWorkerId(2), LedgerWorkerId(1)];
        let a = CryptoUtils::leaf_hash(&ids, &[5, 6], &[0, 0]).unwrap();
        let b = CryptoUtils::leaf_hash(&swapped, &[6, 5], &[0, 0]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let err = CryptoUtils::encode_batch(&[LedgerWorkerId(1)], &[1, 2], &[0]).unwrap_err();
        assert!(matches!(err, DistributionError::InvalidInput(_)));
    }
}
