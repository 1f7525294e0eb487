//! Capability traits over the journaled execution state and the external
//! state transition function. The producer drives these; it never interprets
//! EVM semantics itself.

use crate::TxError;

use alloy_primitives::{Address, B256, I256, U256};
use rollup_node_primitives::{BlockHeader, Receipt, Transaction};

/// A block-local gas pool. Execution draws the pool down; the producer
/// watches the pool to account gas per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPool(u64);

impl GasPool {
    /// Returns a new pool holding the provided amount of gas.
    pub const fn new(gas: u64) -> Self {
        Self(gas)
    }

    /// The gas remaining in the pool.
    pub const fn gas(&self) -> u64 {
        self.0
    }

    /// Draws the provided amount of gas from the pool. Returns false when the
    /// pool cannot cover it, leaving the pool untouched.
    pub fn try_subtract(&mut self, gas: u64) -> bool {
        match self.0.checked_sub(gas) {
            Some(rest) => {
                self.0 = rest;
                true
            }
            None => false,
        }
    }
}

/// The journaled execution state a block is produced against.
///
/// The producer holds exclusive access for the duration of one block. All
/// reads of pricing, retryable, outbox and version information go through
/// this trait so replay and sequencing share one implementation.
pub trait SystemState {
    /// Takes a snapshot of the state and returns its id.
    fn snapshot(&mut self) -> usize;
    /// Reverts the state to the provided snapshot.
    fn revert_to_snapshot(&mut self, id: usize);
    /// Prepares the journal for the next transaction. The index counts
    /// successful state transitions, not attempted ones.
    fn prepare(&mut self, tx_hash: B256, tx_index: usize);

    /// The ether credited to accounts beyond what execution can explain.
    /// Zero on a clean state.
    fn unexpected_balance_delta(&self) -> I256;
    /// Computes the state root over the current state.
    fn state_root(&mut self) -> B256;

    /// The L2 base fee.
    fn base_fee(&self) -> U256;
    /// The per-block gas limit enforced by pricing state.
    fn per_block_gas_limit(&self) -> u64;
    /// The L1 cost of posting the transaction, attributed to the poster.
    fn poster_cost(&self, tx: &Transaction, poster: Address) -> U256;

    /// Whether the retryable ticket exists and is alive at the provided
    /// timestamp.
    fn retryable_exists(&self, ticket_id: B256, timestamp: u64) -> bool;

    /// The root of the outbox merkle accumulator.
    fn send_merkle_root(&self) -> B256;
    /// The size of the outbox merkle accumulator.
    fn send_count(&self) -> u64;
    /// The L1 block number the next block will observe.
    fn next_l1_block_number(&self) -> u64;
    /// The state format version in effect.
    fn state_format_version(&self) -> u64;
}

/// The output of applying one transaction.
#[derive(Debug, Clone)]
pub struct TxExecutionOutput {
    /// The receipt of the transaction.
    pub receipt: Receipt,
    /// Redeems scheduled by the transaction, in scheduling order.
    pub scheduled: Vec<Transaction>,
}

/// The external state transition function.
pub trait TransactionExecutor<S: SystemState> {
    /// Applies the transaction to the state, drawing gas from the pool.
    ///
    /// On error the state may have been partially mutated; the producer
    /// reverts to its pre-transaction snapshot.
    fn apply_transaction(
        &self,
        state: &mut S,
        header: &BlockHeader,
        tx: &Transaction,
        sender: Address,
        gas_pool: &mut GasPool,
    ) -> Result<TxExecutionOutput, TxError>;
}
