//! Integration tests driving the sequencer loop end to end against mock
//! collaborators.

use alloy_primitives::{Address, Bytes, Signature, TxKind, B256, I256, U256};
use rollup_node_block_producer::{SequencingHooks, SystemState, TxError};
use rollup_node_primitives::{
    L1IncomingMessageHeader, SignedTransaction, Transaction, BATCH_POSTER_ADDRESS,
};
use rollup_node_sequencer::{
    L1BlockAndTime, L1HeaderReader, Sequencer, SequencerConfig, SequencerError, StreamerError,
    TransactionForwarder, TransactionStreamer, MAX_TX_BYTES,
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::mpsc;

const CHAIN_ID: u64 = 412346;

/// A stand-in execution state; the mock streamer never touches it.
struct NullState;

impl SystemState for NullState {
    fn snapshot(&mut self) -> usize {
        0
    }
    fn revert_to_snapshot(&mut self, _id: usize) {}
    fn prepare(&mut self, _tx_hash: B256, _tx_index: usize) {}
    fn unexpected_balance_delta(&self) -> I256 {
        I256::ZERO
    }
    fn state_root(&mut self) -> B256 {
        B256::ZERO
    }
    fn base_fee(&self) -> U256 {
        U256::ZERO
    }
    fn per_block_gas_limit(&self) -> u64 {
        0
    }
    fn poster_cost(&self, _tx: &Transaction, _poster: Address) -> U256 {
        U256::ZERO
    }
    fn retryable_exists(&self, _ticket_id: B256, _timestamp: u64) -> bool {
        false
    }
    fn send_merkle_root(&self) -> B256 {
        B256::ZERO
    }
    fn send_count(&self) -> u64 {
        0
    }
    fn next_l1_block_number(&self) -> u64 {
        0
    }
    fn state_format_version(&self) -> u64 {
        0
    }
}

enum Outcome {
    /// Fill the hooks with one `None` per tx and succeed.
    Sequenced,
    /// Fill the hooks with the provided per-tx results and succeed.
    Errors(Vec<Option<TxError>>),
    /// Signal a role loss.
    RetryRole,
    /// Block on the gate, then signal a role loss.
    GateThenRetryRole,
}

#[derive(Default)]
struct MockStreamer {
    script: Mutex<VecDeque<Outcome>>,
    batches: Mutex<Vec<Vec<Transaction>>>,
    gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
}

impl MockStreamer {
    fn scripted(outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(outcomes.into()), ..Default::default() })
    }

    fn batches(&self) -> Vec<Vec<Transaction>> {
        self.batches.lock().unwrap().clone()
    }
}

impl TransactionStreamer for MockStreamer {
    type State = NullState;

    fn sequence_transactions(
        &self,
        header: &L1IncomingMessageHeader,
        txes: &[Transaction],
        hooks: &mut SequencingHooks<'_, Self::State>,
    ) -> Result<(), StreamerError> {
        assert_eq!(header.poster, BATCH_POSTER_ADDRESS);
        self.batches.lock().unwrap().push(txes.to_vec());

        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Outcome::Sequenced);
        match outcome {
            Outcome::Sequenced => {
                hooks.tx_errors = vec![None; txes.len()];
                Ok(())
            }
            Outcome::Errors(errors) => {
                hooks.tx_errors = errors;
                Ok(())
            }
            Outcome::RetryRole => Err(StreamerError::RetrySequencer),
            Outcome::GateThenRetryRole => {
                let gate = self.gate.lock().unwrap().take().expect("gate configured");
                gate.recv_timeout(Duration::from_secs(5)).expect("gate released");
                Err(StreamerError::RetrySequencer)
            }
        }
    }
}

#[derive(Default)]
struct MockForwarder {
    published: Mutex<Vec<B256>>,
}

#[async_trait::async_trait]
impl TransactionForwarder for MockForwarder {
    fn target(&self) -> &str {
        "http://peer:8547"
    }

    async fn publish_transaction(&self, tx: &Transaction) -> Result<(), SequencerError> {
        self.published.lock().unwrap().push(tx.hash_slow());
        Ok(())
    }
}

struct MockL1Reader {
    head: L1BlockAndTime,
}

#[async_trait::async_trait]
impl L1HeaderReader for MockL1Reader {
    async fn last_header(&self) -> Result<L1BlockAndTime, SequencerError> {
        Ok(self.head)
    }

    fn subscribe(&self) -> mpsc::Receiver<L1BlockAndTime> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }
}

fn signed_tx_with(key_byte: u8, nonce: u64, input_size: usize) -> Transaction {
    let key = k256::ecdsa::SigningKey::from_slice(&[key_byte; 32]).unwrap();
    let mut tx = SignedTransaction {
        chain_id: CHAIN_ID,
        nonce,
        gas_price: U256::from(100u64),
        gas_limit: 1_000_000,
        to: TxKind::Call(Address::repeat_byte(0xaa)),
        value: U256::ZERO,
        input: Bytes::from(vec![0x11u8; input_size]),
        signature: Signature::new(U256::from(1u64), U256::from(1u64), false),
    };
    let (sig, recovery_id) = key.sign_prehash_recoverable(tx.signature_hash().as_slice()).unwrap();
    tx.signature = Signature::from_signature_and_parity(sig, recovery_id.is_y_odd());
    Transaction::Signed(tx)
}

fn signed_tx(nonce: u64, input_size: usize) -> Transaction {
    signed_tx_with(0x42, nonce, input_size)
}

fn fast_config() -> SequencerConfig {
    SequencerConfig {
        max_block_speed: Duration::from_millis(10),
        queue_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn no_l1() -> Option<MockL1Reader> {
    None
}

#[tokio::test]
async fn test_should_split_batches_at_size_limit() -> eyre::Result<()> {
    let streamer = MockStreamer::scripted(Vec::new());
    let (sequencer, handle) = Sequencer::new(streamer.clone(), no_l1(), fast_config())?;

    // three txs of roughly 60000, 60000 and 40000 encoded bytes
    let txs = [signed_tx(0, 60_000), signed_tx(1, 60_000), signed_tx(2, 40_000)];
    for tx in &txs {
        assert!(tx.encoded_len() < MAX_TX_BYTES);
    }
    assert!(txs[0].encoded_len() + txs[1].encoded_len() > MAX_TX_BYTES);
    assert!(txs[1].encoded_len() + txs[2].encoded_len() < MAX_TX_BYTES);

    let submissions: Vec<_> = txs
        .iter()
        .map(|tx| {
            let handle = handle.clone();
            let tx = tx.clone();
            tokio::spawn(async move { handle.publish_transaction(tx).await })
        })
        .collect();

    // let all three land in the queue before the loop starts
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = sequencer.start()?;

    for submission in submissions {
        submission.await?.expect("tx should be sequenced");
    }

    // the second tx did not fit the first batch and was pushed back; the
    // second batch carries it together with the third
    let batches = streamer.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0], vec![txs[0].clone()]);
    assert_eq!(batches[1].len(), 2);
    assert!(batches[1].contains(&txs[1]));
    assert!(batches[1].contains(&txs[2]));

    Ok(())
}

#[tokio::test]
async fn test_should_reject_oversized_single_tx() -> eyre::Result<()> {
    let streamer = MockStreamer::scripted(Vec::new());
    let (sequencer, handle) = Sequencer::new(streamer.clone(), no_l1(), fast_config())?;
    let _ = sequencer.start()?;

    let tx = signed_tx(0, 200_000);
    let result = handle.publish_transaction(tx).await;
    assert_eq!(result, Err(SequencerError::OversizedData));

    // no block was produced on its behalf
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(streamer.batches().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_should_forward_batch_on_role_loss() -> eyre::Result<()> {
    let streamer = MockStreamer::scripted(vec![Outcome::RetryRole]);
    let (sequencer, handle) = Sequencer::new(streamer.clone(), no_l1(), fast_config())?;

    let forwarder = Arc::new(MockForwarder::default());

    let txs = [signed_tx(0, 100), signed_tx(1, 100)];
    let submissions: Vec<_> = txs
        .iter()
        .map(|tx| {
            let handle = handle.clone();
            let tx = tx.clone();
            tokio::spawn(async move { handle.publish_transaction(tx).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.set_forwarder(forwarder.clone());
    let _ = sequencer.start()?;

    // each queued item's result is the forwarded publish outcome
    for submission in submissions {
        submission.await?.expect("forwarded submission should succeed");
    }
    let published = forwarder.published.lock().unwrap().clone();
    assert_eq!(published, txs.iter().map(Transaction::hash_slow).collect::<Vec<_>>());

    Ok(())
}

#[tokio::test]
async fn test_should_requeue_and_resequence_on_role_loss() -> eyre::Result<()> {
    // the first attempt loses the role; without a forwarder the batch goes
    // back into the queue and is sequenced on the next tick
    let streamer = MockStreamer::scripted(vec![Outcome::RetryRole]);
    let (sequencer, handle) = Sequencer::new(streamer.clone(), no_l1(), fast_config())?;

    let txs = [signed_tx(0, 100), signed_tx(1, 100)];
    let submissions: Vec<_> = txs
        .iter()
        .map(|tx| {
            let handle = handle.clone();
            let tx = tx.clone();
            tokio::spawn(async move { handle.publish_transaction(tx).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = sequencer.start()?;

    for submission in submissions {
        submission.await?.expect("requeued submission should eventually be sequenced");
    }

    let batches = streamer.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0], batches[1]);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_should_error_queue_full_on_role_loss_overflow() -> eyre::Result<()> {
    let (release, gate) = std::sync::mpsc::channel();
    let streamer = MockStreamer::scripted(vec![Outcome::GateThenRetryRole]);
    *streamer.gate.lock().unwrap() = Some(gate);

    let (sequencer, handle) = Sequencer::new(streamer.clone(), no_l1(), fast_config())?;

    // first wave: three txs that will be mid-sequencing when the role is lost
    let first_wave: Vec<_> = (0..3u64)
        .map(|nonce| {
            let handle = handle.clone();
            let tx = signed_tx(nonce, 100);
            tokio::spawn(async move { handle.publish_transaction(tx).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = sequencer.start()?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // second wave: fill the queue to capacity while the streamer is blocked
    let second_wave: Vec<_> = (100..228u64)
        .map(|nonce| {
            let handle = handle.clone();
            let tx = signed_tx(nonce, 100);
            tokio::spawn(async move { handle.publish_transaction(tx).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // release the streamer: the role loss cannot requeue into the full queue
    release.send(()).unwrap();

    for submission in first_wave {
        assert_eq!(submission.await?, Err(SequencerError::QueueFull));
    }
    // the second wave drains normally afterwards
    for submission in second_wave {
        submission.await?.expect("second wave should be sequenced");
    }

    Ok(())
}

#[tokio::test]
async fn test_should_requeue_gas_limited_tx() -> eyre::Result<()> {
    let streamer = MockStreamer::scripted(vec![Outcome::Errors(vec![
        None,
        Some(TxError::GasLimitReached),
    ])]);
    let (sequencer, handle) = Sequencer::new(streamer.clone(), no_l1(), fast_config())?;

    let txs = [signed_tx(0, 100), signed_tx(1, 100)];
    let submissions: Vec<_> = txs
        .iter()
        .map(|tx| {
            let handle = handle.clone();
            let tx = tx.clone();
            tokio::spawn(async move { handle.publish_transaction(tx).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = sequencer.start()?;

    for submission in submissions {
        submission.await?.expect("both txs should eventually be sequenced");
    }

    let batches = streamer.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    // the gas-limited tx came back on its own in the next batch
    assert_eq!(batches[1], vec![txs[1].clone()]);

    Ok(())
}

#[tokio::test]
async fn test_should_refuse_to_sequence_on_timestamp_skew() -> eyre::Result<()> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let streamer = MockStreamer::scripted(Vec::new());
    let reader = MockL1Reader {
        // two hours behind the local clock, beyond the accepted delta
        head: L1BlockAndTime { block_number: 5, timestamp: now - 7200 },
    };
    let config = SequencerConfig { queue_timeout: Duration::from_millis(300), ..fast_config() };
    let (sequencer, handle) = Sequencer::new(streamer.clone(), Some(reader), config)?;
    sequencer.initialize().await?;
    let _ = sequencer.start()?;

    let result = handle.publish_transaction(signed_tx(0, 100)).await;
    assert_eq!(result, Err(SequencerError::ContextCancelled));
    assert!(streamer.batches().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_should_fail_start_without_initialize() -> eyre::Result<()> {
    let streamer = MockStreamer::scripted(Vec::new());
    let reader = MockL1Reader { head: L1BlockAndTime { block_number: 5, timestamp: 1 } };
    let (sequencer, _handle) = Sequencer::new(streamer, Some(reader), fast_config())?;

    assert!(matches!(sequencer.start(), Err(SequencerError::NotInitialized)));
    Ok(())
}

#[tokio::test]
async fn test_should_enforce_sender_whitelist() -> eyre::Result<()> {
    let allowed = signed_tx_with(0x42, 0, 100);
    let allowed_sender = allowed.recover_sender().unwrap();

    let streamer = MockStreamer::scripted(Vec::new());
    let config = SequencerConfig {
        sender_whitelist: allowed_sender.to_string(),
        ..fast_config()
    };
    let (sequencer, handle) = Sequencer::new(streamer, no_l1(), config)?;
    let _ = sequencer.start()?;

    // a sender missing from the whitelist is rejected at admission
    let outsider = signed_tx_with(0x43, 0, 100);
    let result = handle.publish_transaction(outsider).await;
    assert_eq!(result, Err(SequencerError::SenderNotWhitelisted));

    handle.publish_transaction(allowed).await.expect("whitelisted sender should pass");

    Ok(())
}

#[tokio::test]
async fn test_should_drop_expired_submissions() -> eyre::Result<()> {
    let streamer = MockStreamer::scripted(Vec::new());
    let config = SequencerConfig { queue_timeout: Duration::from_millis(20), ..fast_config() };
    let (sequencer, handle) = Sequencer::new(streamer.clone(), no_l1(), config)?;

    // enqueue before the loop starts, then let the deadline lapse
    let submission = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.publish_transaction(signed_tx(0, 100)).await })
    };
    tokio::time::sleep(Duration::from_millis(60)).await;
    let _ = sequencer.start()?;

    assert_eq!(submission.await?, Err(SequencerError::ContextCancelled));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(streamer.batches().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_forward_target_roundtrip() -> eyre::Result<()> {
    let streamer = MockStreamer::scripted(Vec::new());
    let (_sequencer, handle) = Sequencer::new(streamer, no_l1(), fast_config())?;

    assert_eq!(handle.forward_target(), None);
    handle.set_forwarder(Arc::new(MockForwarder::default()));
    assert_eq!(handle.forward_target(), Some("http://peer:8547".to_string()));
    handle.dont_forward();
    assert_eq!(handle.forward_target(), None);

    Ok(())
}
