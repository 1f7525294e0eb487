//! Deterministic block production.
//!
//! Turns a batched L1 inbox message plus its transactions into the next L2
//! block by driving the external state transition function over a journaled
//! state. The same entry points serve the sequencer (with its filters
//! installed) and the replay path (with noop hooks), so both derive the same
//! chain.

pub use error::{BlockProducerError, TxError};
mod error;

pub use hooks::{NoopPolicy, SequencingHooks, SequencingPolicy};
mod hooks;

pub use state::{GasPool, SystemState, TransactionExecutor, TxExecutionOutput};
mod state;

use alloy_primitives::{keccak256, Bloom, BloomInput, B256, B64, I256, U256};
use alloy_sol_types::SolEvent;
use rollup_node_primitives::{
    Block, BlockHeader, HeaderInfo, L1IncomingMessage, L1IncomingMessageHeader, L2ToL1Transaction,
    L2ToL1Tx, MessageError, Receipt, StartBlockTx, Transaction, BLOCK_GAS_LIMIT,
    EMPTY_OMMERS_HASH, SYSTEM_ADDRESS, TX_GAS,
};
use std::collections::VecDeque;

/// The configuration of the chain being produced.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// The chain id.
    pub chain_id: u64,
    /// Whether the chain runs in debug mode, which escalates balance
    /// mismatches of either sign into a fatal abort.
    pub debug_mode: bool,
}

/// Produces the next block from an L1 inbox message, with noop hooks.
///
/// The batch fetcher resolves batch payload bytes by sequence number for
/// messages that reference one. A fetcher failure aborts production; a
/// malformed message body produces an empty block instead, so replay can
/// always make progress.
pub fn produce_block<S, E, F>(
    message: &L1IncomingMessage,
    delayed_messages_read: u64,
    prev_header: Option<&BlockHeader>,
    state: &mut S,
    executor: &E,
    config: &ChainConfig,
    batch_fetcher: F,
) -> Result<(Block, Vec<Receipt>), BlockProducerError>
where
    S: SystemState + 'static,
    E: TransactionExecutor<S>,
    F: FnMut(u64) -> Result<alloy_primitives::Bytes, Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    let txes = match message.parse_l2_transactions(config.chain_id, batch_fetcher) {
        Ok(txes) => txes,
        Err(MessageError::BatchFetch(err)) => return Err(BlockProducerError::BatchFetch(err)),
        Err(err) => {
            tracing::warn!(target: "rollup_node::producer", ?err, "error parsing incoming message");
            Vec::new()
        }
    };

    let mut hooks = SequencingHooks::noop();
    Ok(produce_block_advanced(
        &message.header,
        txes,
        delayed_messages_read,
        prev_header,
        state,
        executor,
        config,
        &mut hooks,
    ))
}

/// Produces the next block from already-parsed transactions. A bit more
/// flexible than [`produce_block`], for use in the sequencer.
///
/// On return `hooks.tx_errors` holds exactly one entry per input transaction.
/// Fatal invariant violations (minted balance, gas accounting violations,
/// receipt miscounts) abort the process; they are programming errors, not
/// recoverable states.
#[allow(clippy::too_many_arguments)]
pub fn produce_block_advanced<S, E>(
    l1_header: &L1IncomingMessageHeader,
    txes: Vec<Transaction>,
    delayed_messages_read: u64,
    prev_header: Option<&BlockHeader>,
    state: &mut S,
    executor: &E,
    config: &ChainConfig,
    hooks: &mut SequencingHooks<'_, S>,
) -> (Block, Vec<Receipt>)
where
    S: SystemState,
    E: TransactionExecutor<S>,
{
    if state.unexpected_balance_delta() != I256::ZERO {
        panic!("produce_block called with dirty state (non-zero unexpected balance delta)");
    }

    let poster = l1_header.poster;
    let mut header = create_header(prev_header, l1_header, state);
    let gas_price = header.base_fee_per_gas;

    // Note: this will diverge from the actual gas left during execution in
    // the event of invalid txs, but it's only used as a block-local
    // representation limiting the amount of work done in a block.
    let mut block_gas_left = state.per_block_gas_limit();

    // Prepend a tx before all others to touch up the state (update the L1
    // block number, pricing pools, etc). It uses noop filters and so cannot
    // be dropped.
    let start_tx = Transaction::Internal(rollup_node_primitives::InternalTx::StartBlock(
        StartBlockTx::new(
            config.chain_id,
            l1_header.l1_base_fee,
            l1_header.block_number,
            header.number,
            header.timestamp,
            prev_header.map(|h| h.timestamp).unwrap_or(header.timestamp),
        ),
    ));

    let mut pending: VecDeque<Transaction> = VecDeque::with_capacity(txes.len() + 1);
    pending.push_back(start_tx);
    pending.extend(txes);

    let mut redeems: VecDeque<Transaction> = VecDeque::new();
    let mut complete: Vec<Transaction> = Vec::new();
    let mut receipts: Vec<Receipt> = Vec::new();
    let mut expected_balance_delta = I256::ZERO;
    let mut user_txs_processed = 0usize;

    // The block can fit each message on its own, so this pool is set to not
    // run out.
    let mut block_gas_pool = GasPool::new(BLOCK_GAS_LIMIT);

    while !pending.is_empty() || !redeems.is_empty() {
        // repeatedly process the next tx, doing redeems created along the way
        // in FIFO order
        let (tx, is_user_tx) = if let Some(tx) = redeems.pop_front() {
            let retry = tx.as_retry().expect("redeem queue only holds retryables");
            if !state.retryable_exists(retry.ticket_id, header.timestamp) {
                // retryable was already deleted
                continue;
            }
            (tx, false)
        } else {
            let tx = pending.pop_front().expect("pending is non-empty");
            let is_user_tx = !tx.is_internal();
            (tx, is_user_tx)
        };

        // redeems and internal txs bypass the sequencing filters
        let policy = hooks.policy;
        let filtered = is_user_tx;
        let discard_invalid_early = filtered && hooks.discard_invalid_txs_early;

        let mut data_gas: u64 = 0;
        let snapshot = state.snapshot();
        let pool_before = block_gas_pool;

        let outcome: Result<(Receipt, Vec<Transaction>), TxError> = 'apply: {
            // if we've done too much work in this block, discard the tx as
            // early as possible
            if block_gas_left < TX_GAS && is_user_tx {
                break 'apply Err(TxError::GasLimitReached)
            }

            let sender = match tx.recover_sender() {
                Ok(sender) => sender,
                Err(_) => break 'apply Err(TxError::InvalidSignature),
            };

            if filtered {
                if let Err(err) = policy.pre_tx_filter(state, &tx, sender) {
                    break 'apply Err(err)
                }
            }

            if gas_price > U256::ZERO {
                // A poster cost that does not fit u64 gas prices the whole
                // allowance as data gas; the tx then fails the intrinsic
                // gas floor below.
                data_gas = u64::MAX;
                let poster_cost = state.poster_cost(&tx, poster);
                match u64::try_from(poster_cost / gas_price) {
                    Ok(cost) => data_gas = cost,
                    Err(_) => {
                        tracing::error!(target: "rollup_node::producer", %poster_cost, %gas_price, "could not get poster cost in L2 gas terms");
                    }
                }
            }
            if data_gas > tx.gas() {
                // this txn is going to be rejected later
                data_gas = tx.gas();
            }

            let mut compute_gas = tx.gas() - data_gas;
            if compute_gas < TX_GAS {
                if discard_invalid_early {
                    break 'apply Err(TxError::IntrinsicGas)
                }
                // ensure at least TX_GAS is charged for the state transition
                compute_gas = TX_GAS;
            }

            if compute_gas > block_gas_left && is_user_tx && user_txs_processed > 0 {
                break 'apply Err(TxError::GasLimitReached)
            }

            // the journal index counts successful state transitions
            state.prepare(tx.hash_slow(), receipts.len());

            let output =
                match executor.apply_transaction(state, &header, &tx, sender, &mut block_gas_pool) {
                    Ok(output) => output,
                    Err(err) => break 'apply Err(err),
                };

            if filtered {
                if let Err(err) =
                    policy.post_tx_filter(state, &tx, sender, data_gas, &output.receipt)
                {
                    break 'apply Err(err)
                }
            }

            Ok((output.receipt, output.scheduled))
        };

        // record the result, even when the tx was included
        if is_user_tx {
            hooks.tx_errors.push(outcome.as_ref().err().cloned());
        }

        let (mut receipt, scheduled) = match outcome {
            Ok(ok) => ok,
            Err(err) => {
                tracing::debug!(target: "rollup_node::producer", %err, tx_hash = %tx.hash_slow(), "error applying transaction");
                state.revert_to_snapshot(snapshot);
                block_gas_pool = pool_before;
                if !discard_invalid_early {
                    // still deduct a flat TX_GAS from the block-local rate
                    // limiter even though the tx was invalid
                    block_gas_left = block_gas_left.saturating_sub(TX_GAS);
                    if is_user_tx {
                        user_txs_processed += 1;
                    }
                }
                continue;
            }
        };

        // deposit-style txs are expected to credit the system with ether
        match &tx {
            Transaction::Deposit(deposit) => {
                expected_balance_delta += I256::try_from(deposit.value)
                    .expect("deposit value fits a signed 256-bit integer");
            }
            Transaction::SubmitRetryable(submit) => {
                expected_balance_delta += I256::try_from(submit.deposit_value)
                    .expect("deposit value fits a signed 256-bit integer");
            }
            _ => {}
        }

        if block_gas_pool.gas() > pool_before.gas() {
            panic!(
                "apply_transaction gave back {} gas",
                block_gas_pool.gas() - pool_before.gas()
            );
        }
        let gas_used = pool_before.gas() - block_gas_pool.gas();

        let mut compute_used = gas_used.saturating_sub(data_gas);
        if gas_used < data_gas {
            tracing::error!(target: "rollup_node::producer", delta = data_gas - gas_used, "apply_transaction used less gas than it should have");
            compute_used = TX_GAS;
        } else if compute_used < TX_GAS {
            compute_used = TX_GAS;
        }
        if gas_used > tx.gas() {
            panic!("apply_transaction used {} more gas than it should have", gas_used - tx.gas());
        }

        header.gas_used += gas_used;

        // append any scheduled redeems
        redeems.extend(scheduled);

        // L2 -> L1 withdrawals remove ether from the system. The positional
        // event replaced the older one; both are handled regardless of
        // version.
        for log in &receipt.logs {
            if log.address != SYSTEM_ADDRESS {
                continue;
            }
            match log.data.topics().first() {
                Some(&L2ToL1Transaction::SIGNATURE_HASH) => {
                    match L2ToL1Transaction::decode_log(log) {
                        Ok(event) => {
                            expected_balance_delta -= I256::try_from(event.data.callvalue)
                                .expect("callvalue fits a signed 256-bit integer");
                        }
                        Err(err) => {
                            tracing::error!(target: "rollup_node::producer", %err, "failed to parse L2 to L1 transaction log");
                        }
                    }
                }
                Some(&L2ToL1Tx::SIGNATURE_HASH) => match L2ToL1Tx::decode_log(log) {
                    Ok(event) => {
                        expected_balance_delta -= I256::try_from(event.data.callvalue)
                            .expect("callvalue fits a signed 256-bit integer");
                    }
                    Err(err) => {
                        tracing::error!(target: "rollup_node::producer", %err, "failed to parse L2 to L1 tx log");
                    }
                },
                _ => {}
            }
        }

        block_gas_left = block_gas_left.saturating_sub(compute_used);

        receipt.transaction_hash = tx.hash_slow();
        receipt.transaction_index = receipts.len() as u64;

        complete.push(tx);
        receipts.push(receipt);

        if is_user_tx {
            user_txs_processed += 1;
        }
    }

    // the nonce carries the delayed message count for the replay path
    header.nonce = B64::from(delayed_messages_read.to_be_bytes());

    // add outbox info to the header for client-side proving
    let info = HeaderInfo {
        send_root: state.send_merkle_root(),
        send_count: state.send_count(),
        l1_block_number: state.next_l1_block_number(),
        state_format_version: state.state_format_version(),
    };
    info.update_header(&mut header);

    header.transactions_root = ordered_commitment(complete.iter().map(Transaction::hash_slow));
    header.receipts_root = ordered_commitment(receipts.iter().map(receipt_commitment));
    header.logs_bloom = logs_bloom(&receipts);
    header.state_root = state.state_root();

    let block = Block::new(header, complete);
    let block_hash = block.hash_slow();
    for receipt in &mut receipts {
        receipt.block_hash = Some(block_hash);
    }

    if block.transactions.len() != receipts.len() {
        panic!("block has {} txes but {} receipts", block.transactions.len(), receipts.len());
    }

    let balance_delta = state.unexpected_balance_delta();
    if balance_delta != expected_balance_delta {
        if balance_delta > expected_balance_delta || config.debug_mode {
            // ether was minted out of thin air
            panic!(
                "unexpected total balance delta {balance_delta} (expected {expected_balance_delta})"
            );
        } else {
            // a real chain burning funds is wrong but recoverable
            tracing::error!(target: "rollup_node::producer", %balance_delta, %expected_balance_delta, "unexpected total balance delta");
        }
    }

    (block, receipts)
}

fn create_header<S: SystemState>(
    prev_header: Option<&BlockHeader>,
    l1_header: &L1IncomingMessageHeader,
    state: &S,
) -> BlockHeader {
    let mut parent_hash = B256::ZERO;
    let mut number = 0;
    let mut timestamp = l1_header.timestamp;
    if let Some(prev) = prev_header {
        parent_hash = prev.hash_slow();
        number = prev.number + 1;
        // time never runs backwards
        if timestamp < prev.timestamp {
            timestamp = prev.timestamp;
        }
    }

    BlockHeader {
        parent_hash,
        ommers_hash: EMPTY_OMMERS_HASH,
        beneficiary: l1_header.poster,
        difficulty: U256::from(1u64),
        number,
        gas_limit: BLOCK_GAS_LIMIT,
        gas_used: 0,
        timestamp,
        base_fee_per_gas: state.base_fee(),
        ..Default::default()
    }
}

/// A flat commitment over an ordered list of hashes.
fn ordered_commitment(hashes: impl Iterator<Item = B256>) -> B256 {
    let mut buf = Vec::new();
    for hash in hashes {
        buf.extend_from_slice(hash.as_slice());
    }
    keccak256(buf)
}

fn receipt_commitment(receipt: &Receipt) -> B256 {
    let mut buf = Vec::with_capacity(32 + 1 + 8);
    buf.extend_from_slice(receipt.transaction_hash.as_slice());
    buf.push(receipt.success as u8);
    buf.extend_from_slice(&receipt.gas_used.to_be_bytes());
    keccak256(buf)
}

fn logs_bloom(receipts: &[Receipt]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for receipt in receipts {
        for log in &receipt.logs {
            bloom.accrue(BloomInput::Raw(log.address.as_slice()));
            for topic in log.data.topics() {
                bloom.accrue(BloomInput::Raw(topic.as_slice()));
            }
        }
    }
    bloom
}
