use distribution_models::{EpochRange, LedgerWorkerId};
use sp_core::H256;

use reward_distribution::utils::crypto::CryptoUtils;
use reward_distribution::utils::errors::DistributionError;
use reward_distribution::utils::merkle::MerkleTree;

fn leaves(n: usize) -> Vec<H256> {
    (0..n).map(|i| CryptoUtils::keccak(format!("leaf{i}").as_bytes())).collect()
}

#[test]
fn test_merkle_proof() {
    let leaf: Vec<H256> = leaves(4);

    let hash01 = CryptoUtils::hash_pair(&leaf[0], &leaf[1]);
    let hash23 = CryptoUtils::hash_pair(&leaf[2], &leaf[3]);
    let root = CryptoUtils::hash_pair(&hash01, &hash23);

    let tree = MerkleTree::build(&leaf).unwrap();
    assert_eq!(tree.root(), root);
    assert_eq!(tree.proof(0), Some(vec![leaf[1], hash23]));
    assert!(CryptoUtils::verify_merkle_proof(root, &[leaf[1], hash23], leaf[0]));
}

#[test]
fn test_every_proof_verifies_for_any_leaf_count() {
    for n in 1..=33 {
        let leaves = leaves(n);
        let tree = MerkleTree::build(&leaves).unwrap();
        assert_eq!(tree.leaf_count(), n);
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(MerkleTree::verify(*leaf, &proof, tree.root()), "leaf {i} of {n}");
        }
        assert!(tree.proof(n).is_none());
    }
}

#[test]
fn test_proof_fails_for_foreign_leaf() {
    let leaves = leaves(5);
    let tree = MerkleTree::build(&leaves).unwrap();
    let proof = tree.proof(2).unwrap();
    let stranger = CryptoUtils::keccak(b"stranger");
    assert!(!MerkleTree::verify(stranger, &proof, tree.root()));
}

#[test]
fn test_odd_node_is_paired_with_itself() {
    let leaves = leaves(3);
    let tree = MerkleTree::build(&leaves).unwrap();

    let hash01 = CryptoUtils::hash_pair(&leaves[0], &leaves[1]);
    let hash22 = CryptoUtils::hash_pair(&leaves[2], &leaves[2]);
    assert_eq!(tree.root(), CryptoUtils::hash_pair(&hash01, &hash22));
    assert_eq!(tree.proof(2), Some(vec![leaves[2], hash01]));
}

#[test]
fn test_root_depends_on_leaf_order() {
    let mut leaves = leaves(4);
    let root = MerkleTree::build(&leaves).unwrap().root();
    assert_eq!(MerkleTree::build(&leaves).unwrap().root(), root);

    leaves.swap(0, 3);
    assert_ne!(MerkleTree::build(&leaves).unwrap().root(), root);
}

#[test]
fn test_empty_tree_is_an_error() {
    assert!(matches!(MerkleTree::build(&[]), Err(DistributionError::EmptyTree)));
}

#[test]
fn test_batch_encoding_uses_32_byte_words() {
    let recipients = [LedgerWorkerId(1), LedgerWorkerId(2)];
    let encoded = CryptoUtils::encode_batch(&recipients, &[10, 20], &[1, 2]).unwrap();
    assert_eq!(encoded.len(), 6 * 32);
    assert_eq!(encoded[31], 1);
    assert_eq!(encoded[63], 2);
    assert_eq!(encoded[95], 10);
    assert!(encoded[..31].iter().all(|b| *b == 0));

    let err = CryptoUtils::encode_batch(&recipients, &[10], &[1, 2]).unwrap_err();
    assert!(matches!(err, DistributionError::InvalidInput(_)));
}

#[test]
fn test_commitment_key_hashes_both_bounds() {
    let mut input = [0u8; 64];
    input[24..32].copy_from_slice(&1000u64.to_be_bytes());
    input[56..64].copy_from_slice(&2000u64.to_be_bytes());

    let range = EpochRange::new(1000, 2000).unwrap();
    assert_eq!(range.commitment_key(), CryptoUtils::keccak(&input));
    assert_ne!(range.commitment_key(), EpochRange::new(1000, 2001).unwrap().commitment_key());
}
