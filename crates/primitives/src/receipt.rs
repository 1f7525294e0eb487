use alloy_primitives::{Log, B256};

/// The receipt of an executed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Receipt {
    /// Whether execution succeeded.
    pub success: bool,
    /// The gas used by the transaction, data gas included.
    pub gas_used: u64,
    /// The logs emitted during execution.
    pub logs: Vec<Log>,
    /// The hash of the transaction.
    pub transaction_hash: B256,
    /// The index of the transaction within its block.
    pub transaction_index: u64,
    /// The hash of the enclosing block, patched in at block assembly.
    pub block_hash: Option<B256>,
}
