use crate::{BlockHeader, Transaction};

use alloy_primitives::B256;

/// The block information.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    /// The number of the block.
    pub number: u64,
    /// The hash of the block.
    pub hash: B256,
}

impl BlockInfo {
    /// Returns a new instance of [`BlockInfo`].
    pub const fn new(number: u64, hash: B256) -> Self {
        Self { number, hash }
    }
}

impl std::fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockInfo {{ number: {}, hash: {} }}", self.number, self.hash)
    }
}

/// A produced L2 block. Never mutated once returned by the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// The transactions of the block, the synthetic start-of-block
    /// transaction first.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Returns a new instance of [`Block`].
    pub const fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Computes the block hash.
    pub fn hash_slow(&self) -> B256 {
        self.header.hash_slow()
    }

    /// Returns the block info for the block.
    pub fn info(&self) -> BlockInfo {
        BlockInfo::new(self.header.number, self.hash_slow())
    }
}
