use crate::{state::SystemState, TxError};

use alloy_primitives::Address;
use rollup_node_primitives::{Receipt, Transaction};

/// The filters a sequencer may impose on user transactions during block
/// production. Internal transactions and scheduled redeems never pass
/// through these.
pub trait SequencingPolicy<S: SystemState>: Send + Sync {
    /// Called before a user transaction executes. An error drops the
    /// transaction.
    fn pre_tx_filter(
        &self,
        _state: &S,
        _tx: &Transaction,
        _sender: Address,
    ) -> Result<(), TxError> {
        Ok(())
    }

    /// Called after a user transaction executed successfully. An error drops
    /// the already-executed transaction; the producer reverts the state.
    fn post_tx_filter(
        &self,
        _state: &S,
        _tx: &Transaction,
        _sender: Address,
        _data_gas: u64,
        _receipt: &Receipt,
    ) -> Result<(), TxError> {
        Ok(())
    }
}

/// A policy imposing no filters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPolicy;

impl<S: SystemState> SequencingPolicy<S> for NoopPolicy {}

/// The sequencing hooks handed to the producer for one block.
///
/// `tx_errors` is filled with one entry per user transaction, in input
/// order; `None` marks inclusion, `Some` carries the reason the transaction
/// was dropped.
pub struct SequencingHooks<'a, S> {
    /// When set, invalid transactions do not consume the flat per-transaction
    /// block gas penalty.
    pub discard_invalid_txs_early: bool,
    /// The per-user-transaction results, parallel to the input order.
    pub tx_errors: Vec<Option<TxError>>,
    /// The filters to apply to user transactions.
    pub policy: &'a dyn SequencingPolicy<S>,
}

impl<'a, S: SystemState> SequencingHooks<'a, S> {
    /// Returns hooks carrying the provided policy.
    pub fn new(policy: &'a dyn SequencingPolicy<S>, discard_invalid_txs_early: bool) -> Self {
        Self { discard_invalid_txs_early, tx_errors: Vec::new(), policy }
    }
}

impl<S: SystemState> SequencingHooks<'static, S> {
    /// Returns hooks imposing no filters, as used outside sequencing.
    pub fn noop() -> Self {
        Self { discard_invalid_txs_early: false, tx_errors: Vec::new(), policy: &NoopPolicy }
    }
}

impl<S> std::fmt::Debug for SequencingHooks<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencingHooks")
            .field("discard_invalid_txs_early", &self.discard_invalid_txs_early)
            .field("tx_errors", &self.tx_errors)
            .field("policy", &"SequencingPolicy")
            .finish()
    }
}
