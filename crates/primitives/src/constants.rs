//! Protocol constants shared across the node.

use alloy_primitives::{address, b256, Address, B256};

/// The gas limit stamped into every L2 block header. Individual blocks are
/// constrained by the per-block gas limit held in state, not by this value.
pub const BLOCK_GAS_LIMIT: u64 = 1 << 50;

/// The minimum amount of gas charged for a transaction.
pub const TX_GAS: u64 = 21_000;

/// The address credited as the poster of sequencer batches.
pub const BATCH_POSTER_ADDRESS: Address = address!("a4b000000000000000000073657175656e636572");

/// The system precompile address emitting L2 -> L1 transaction events.
pub const SYSTEM_ADDRESS: Address = address!("0000000000000000000000000000000000000064");

/// The sender recorded for internal (node-generated) transactions.
pub const INTERNAL_TX_SENDER: Address = address!("00000000000000000000000000000000000a4b05");

/// Keccak-256 of the RLP encoding of an empty list, used as the ommers hash.
pub const EMPTY_OMMERS_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// Transaction type byte for L1 -> L2 deposits.
pub const DEPOSIT_TX_TYPE: u8 = 0x64;

/// Transaction type byte for retryable redeems.
pub const RETRY_TX_TYPE: u8 = 0x68;

/// Transaction type byte for retryable ticket submissions.
pub const SUBMIT_RETRYABLE_TX_TYPE: u8 = 0x69;

/// Transaction type byte for internal transactions.
pub const INTERNAL_TX_TYPE: u8 = 0x6a;
