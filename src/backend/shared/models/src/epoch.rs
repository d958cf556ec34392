use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sp_core::H256;

use crate::encoding::append_words;
use crate::error::ModelError;

/// Half-open block interval `[from_block, to_block)` settled as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpochRange {
    pub from_block: u64,
    pub to_block: u64,
}

impl EpochRange {
    pub fn new(from_block: u64, to_block: u64) -> Result<Self, ModelError> {
        if from_block >= to_block {
            return Err(ModelError::InvalidRange { from_block, to_block });
        }
        Ok(Self { from_block, to_block })
    }

    /// Number of blocks covered by the range.
    pub fn len(&self) -> u64 {
        self.to_block - self.from_block
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Idempotency key of the range: keccak256 over the two bounds encoded as
    /// 32-byte words, matching the ledger's own key derivation.
    pub fn commitment_key(&self) -> H256 {
        let mut input = Vec::with_capacity(64);
        append_words(&mut input, [self.from_block as u128, self.to_block as u128]);
        sp_core::keccak_256(&input).into()
    }

    /// The range immediately following this one, of the same length.
    pub fn following(&self) -> Self {
        let len = self.len();
        Self {
            from_block: self.to_block,
            to_block: self.to_block.saturating_add(len),
        }
    }
}

impl fmt::Display for EpochRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from_block, self.to_block)
    }
}

impl FromStr for EpochRange {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ModelError::MalformedRangeId(s.to_string());
        let (from, to) = s.split_once('-').ok_or_else(malformed)?;
        let from_block = from.trim().parse::<u64>().map_err(|_| malformed())?;
        let to_block = to.trim().parse::<u64>().map_err(|_| malformed())?;
        Self::new(from_block, to_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_inverted_ranges() {
        assert!(EpochRange::new(10, 10).is_err());
        assert!(EpochRange::new(11, 10).is_err());
        assert!(EpochRange::new(10, 11).is_ok());
    }

    #[test]
    fn range_id_round_trips_through_display() {
        let range = EpochRange::new(1000, 2000).unwrap();
        assert_eq!(range.to_string(), "1000-2000");
        assert_eq!("1000-2000".parse::<EpochRange>().unwrap(), range);
        assert!("1000".parse::<EpochRange>().is_err());
        assert!("2000-1000".parse::<EpochRange>().is_err());
    }

    #[test]
    fn commitment_key_depends_on_both_bounds() {
        let a = EpochRange::new(1000, 2000).unwrap();
        let b = EpochRange::new(1000, 2001).unwrap();
        let c = EpochRange::new(999, 2000).unwrap();
        assert_eq!(a.commitment_key(), EpochRange::new(1000, 2000).unwrap().commitment_key());
        assert_ne!(a.commitment_key(), b.commitment_key());
        assert_ne!(a.commitment_key(), c.commitment_key());
    }

    #[test]
    fn following_range_is_contiguous() {
        let range = EpochRange::new(100, 150).unwrap();
        assert_eq!(range.following(), EpochRange::new(150, 200).unwrap());
    }
}
