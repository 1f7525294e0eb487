//! The content-addressing hash for data availability payloads.
//!
//! Payloads are split into fixed-size bins and merkelized with
//! domain-separated leaf and node hashes, so a stored object can be
//! addressed by a single 32-byte root regardless of its size.

use alloy_primitives::{keccak256, B256};

/// The size of a tree bin in bytes.
pub const BIN_SIZE: usize = 64 * 1024;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Computes the tree hash of the provided bytes.
pub fn hash(data: &[u8]) -> B256 {
    let mut level: Vec<B256> = if data.is_empty() {
        vec![leaf_hash(&[])]
    } else {
        data.chunks(BIN_SIZE).map(leaf_hash).collect()
    };

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => node_hash(left, right),
                [lone] => *lone,
                _ => unreachable!("chunks of two"),
            })
            .collect();
    }

    level[0]
}

/// Whether the provided bytes hash to the expected root.
pub fn valid_hash(expected: B256, data: &[u8]) -> bool {
    hash(data) == expected
}

fn leaf_hash(bin: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(1 + bin.len());
    buf.push(LEAF_PREFIX);
    buf.extend_from_slice(bin);
    keccak256(buf)
}

fn node_hash(left: &B256, right: &B256) -> B256 {
    let mut buf = [0u8; 65];
    buf[0] = NODE_PREFIX;
    buf[1..33].copy_from_slice(left.as_slice());
    buf[33..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_hash_single_bin() {
        let data = vec![0x42u8; 100];
        assert_eq!(hash(&data), leaf_hash(&data));
        assert!(valid_hash(hash(&data), &data));
    }

    #[test]
    fn test_should_hash_multiple_bins() {
        let data = vec![0x42u8; 3 * BIN_SIZE];
        let leaves: Vec<_> = data.chunks(BIN_SIZE).map(leaf_hash).collect();
        let expected = node_hash(&node_hash(&leaves[0], &leaves[1]), &leaves[2]);
        assert_eq!(hash(&data), expected);
    }

    #[test]
    fn test_should_reject_tampered_data() {
        let data = vec![0x42u8; 200];
        let root = hash(&data);
        let mut tampered = data;
        tampered[0] ^= 1;
        assert!(!valid_hash(root, &tampered));
    }
}
