use crate::constants::EMPTY_OMMERS_HASH;

use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256, B64, U256};
use alloy_rlp::{Encodable, RlpEncodable};

/// An L2 block header.
///
/// The nonce field repurposes its eight bytes for the big-endian count of
/// delayed messages read up to and including the block. The extra-data and
/// mix-hash fields carry the outbox information, see [`HeaderInfo`].
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable)]
pub struct BlockHeader {
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The ommers hash, always the empty-list hash.
    pub ommers_hash: B256,
    /// The batch poster of the block.
    pub beneficiary: Address,
    /// The state root after executing the block.
    pub state_root: B256,
    /// The transactions trie root.
    pub transactions_root: B256,
    /// The receipts trie root.
    pub receipts_root: B256,
    /// The logs bloom filter.
    pub logs_bloom: Bloom,
    /// The difficulty, always one.
    pub difficulty: U256,
    /// The block number.
    pub number: u64,
    /// The block gas limit.
    pub gas_limit: u64,
    /// The gas used by the block.
    pub gas_used: u64,
    /// The block timestamp, taken from the L1 and clamped to the parent's.
    pub timestamp: u64,
    /// Extra data, carrying the outbox send root.
    pub extra_data: Bytes,
    /// The mix hash, carrying the remaining outbox fields.
    pub mix_hash: B256,
    /// Big-endian count of delayed messages read.
    pub nonce: B64,
    /// The base fee, pulled from L2 pricing state.
    pub base_fee_per_gas: U256,
}

impl BlockHeader {
    /// Computes the header hash.
    pub fn hash_slow(&self) -> B256 {
        let mut buf = Vec::with_capacity(self.length());
        self.encode(&mut buf);
        keccak256(buf)
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_OMMERS_HASH,
            beneficiary: Address::ZERO,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            logs_bloom: Bloom::ZERO,
            difficulty: U256::from(1u64),
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: B256::ZERO,
            nonce: B64::ZERO,
            base_fee_per_gas: U256::ZERO,
        }
    }
}

/// The outbox information embedded into a produced block header for
/// client-side proving of L2 -> L1 messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderInfo {
    /// The root of the outbox merkle accumulator.
    pub send_root: B256,
    /// The size of the outbox merkle accumulator.
    pub send_count: u64,
    /// The L1 block number the next block will observe.
    pub l1_block_number: u64,
    /// The state format version in effect.
    pub state_format_version: u64,
}

impl HeaderInfo {
    /// Writes the outbox info into the header's extra-data and mix-hash fields.
    pub fn update_header(&self, header: &mut BlockHeader) {
        header.extra_data = Bytes::copy_from_slice(self.send_root.as_slice());
        let mut mix = [0u8; 32];
        mix[..8].copy_from_slice(&self.send_count.to_be_bytes());
        mix[8..16].copy_from_slice(&self.l1_block_number.to_be_bytes());
        mix[16..24].copy_from_slice(&self.state_format_version.to_be_bytes());
        header.mix_hash = B256::from(mix);
    }

    /// Reads the outbox info back out of a header. Returns `None` if the
    /// extra-data field does not hold a 32-byte send root.
    pub fn from_header(header: &BlockHeader) -> Option<Self> {
        let send_root = B256::try_from(header.extra_data.as_ref()).ok()?;
        let mix = header.mix_hash.as_slice();
        Some(Self {
            send_root,
            send_count: u64::from_be_bytes(mix[..8].try_into().expect("slice length is 8")),
            l1_block_number: u64::from_be_bytes(mix[8..16].try_into().expect("slice length is 8")),
            state_format_version: u64::from_be_bytes(
                mix[16..24].try_into().expect("slice length is 8"),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_should_roundtrip_header_info() {
        let info = HeaderInfo {
            send_root: b256!("0303030303030303030303030303030303030303030303030303030303030303"),
            send_count: 12,
            l1_block_number: 400,
            state_format_version: 6,
        };

        let mut header = BlockHeader::default();
        info.update_header(&mut header);

        assert_eq!(HeaderInfo::from_header(&header), Some(info));
    }
}
