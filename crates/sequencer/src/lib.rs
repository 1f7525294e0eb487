//! The sequencer engine.
//!
//! Accepts client submissions into a bounded queue, drains the queue on a
//! cadence into batches of bounded byte size, and hands each batch to the
//! transaction streamer for block production. When the node is not the
//! active sequencer, submissions are forwarded to a peer endpoint instead.

pub use config::SequencerConfig;
mod config;

pub use error::{SequencerError, StreamerError};
mod error;

pub use forwarder::{HttpForwarder, TransactionForwarder};
mod forwarder;

pub use metrics::SequencerMetrics;
mod metrics;

use alloy_primitives::Address;
use rollup_node_block_producer::{SequencingHooks, SequencingPolicy, SystemState, TxError};
use rollup_node_primitives::{
    L1IncomingMessageHeader, L1MessageKind, Receipt, Transaction, BATCH_POSTER_ADDRESS,
};
use std::{
    collections::HashSet,
    str::FromStr,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};

/// The capacity of the transaction queue.
const TX_QUEUE_SIZE: usize = 128;

/// 95% of the L1 inbox size limit, leaving headroom for headers and such.
/// Bounds both a single transaction and the total bytes of one batch.
pub const MAX_TX_BYTES: usize = 112_065;

/// The capability the sequencer uses to turn a batch into a block. The
/// sequencer holds only this interface, never the streamer itself.
pub trait TransactionStreamer: Send + Sync + 'static {
    /// The execution state the streamer produces blocks against.
    type State: SystemState;

    /// Sequences the batch into a block. On success `hooks.tx_errors` must
    /// hold exactly one entry per input transaction.
    fn sequence_transactions(
        &self,
        header: &L1IncomingMessageHeader,
        txes: &[Transaction],
        hooks: &mut SequencingHooks<'_, Self::State>,
    ) -> Result<(), StreamerError>;
}

impl<T: TransactionStreamer> TransactionStreamer for Arc<T> {
    type State = T::State;

    fn sequence_transactions(
        &self,
        header: &L1IncomingMessageHeader,
        txes: &[Transaction],
        hooks: &mut SequencingHooks<'_, Self::State>,
    ) -> Result<(), StreamerError> {
        self.as_ref().sequence_transactions(header, txes, hooks)
    }
}

/// The snapshot of the latest L1 head the sequencer pins its batches to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct L1BlockAndTime {
    /// The L1 block number.
    pub block_number: u64,
    /// The L1 block timestamp.
    pub timestamp: u64,
}

/// The capability to observe L1 headers.
#[async_trait::async_trait]
pub trait L1HeaderReader: Send + Sync + 'static {
    /// Returns the latest known L1 header.
    async fn last_header(&self) -> Result<L1BlockAndTime, SequencerError>;

    /// Subscribes to new L1 headers.
    fn subscribe(&self) -> mpsc::Receiver<L1BlockAndTime>;
}

/// A queued submission waiting to be sequenced.
#[derive(Debug)]
struct TxQueueItem {
    tx: Transaction,
    result_tx: oneshot::Sender<Result<(), SequencerError>>,
    deadline: Instant,
}

impl TxQueueItem {
    fn return_result(self, result: Result<(), SequencerError>) {
        let _ = self.result_tx.send(result);
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// State shared between the sequencer task, the submission handles and the
/// L1 head subscriber. The two mutexes are never held at the same time, and
/// neither is held across an await.
#[derive(Default)]
struct SequencerShared {
    l1_block_and_time: Mutex<L1BlockAndTime>,
    forwarder: Mutex<Option<Arc<dyn TransactionForwarder>>>,
}

impl SequencerShared {
    fn update_latest_l1_block(&self, header: L1BlockAndTime) {
        let mut guard = self.l1_block_and_time.lock().expect("l1 snapshot lock not poisoned");
        if guard.block_number < header.block_number {
            *guard = header;
        }
    }

    fn l1_snapshot(&self) -> L1BlockAndTime {
        *self.l1_block_and_time.lock().expect("l1 snapshot lock not poisoned")
    }

    fn forwarder(&self) -> Option<Arc<dyn TransactionForwarder>> {
        self.forwarder.lock().expect("forwarder lock not poisoned").clone()
    }
}

/// A cloneable handle for submitting transactions and administering the
/// running sequencer.
#[derive(Clone)]
pub struct SequencerHandle {
    queue_tx: mpsc::Sender<TxQueueItem>,
    shared: Arc<SequencerShared>,
    sender_whitelist: Arc<HashSet<Address>>,
    queue_timeout: std::time::Duration,
}

impl SequencerHandle {
    /// Submits a transaction and waits for its sequencing outcome.
    ///
    /// Blocks until the transaction is accepted into a block, rejected with
    /// an error, or the submission deadline elapses.
    pub async fn publish_transaction(&self, tx: Transaction) -> Result<(), SequencerError> {
        if !self.sender_whitelist.is_empty() {
            let sender = tx.recover_sender().map_err(|_| SequencerError::InvalidSignature)?;
            if !self.sender_whitelist.contains(&sender) {
                return Err(SequencerError::SenderNotWhitelisted)
            }
        }

        let deadline = Instant::now() + self.queue_timeout;
        let (result_tx, result_rx) = oneshot::channel();
        let item = TxQueueItem { tx, result_tx, deadline };

        match tokio::time::timeout_at(deadline, self.queue_tx.send(item)).await {
            Err(_) => return Err(SequencerError::ContextCancelled),
            Ok(Err(_)) => return Err(SequencerError::ContextCancelled),
            Ok(Ok(())) => {}
        }

        match tokio::time::timeout_at(deadline, result_rx).await {
            Err(_) => Err(SequencerError::ContextCancelled),
            Ok(Err(_)) => Err(SequencerError::ContextCancelled),
            Ok(Ok(result)) => result,
        }
    }

    /// Starts forwarding submissions to the provided peer endpoint.
    pub fn forward_to(&self, url: &str) -> Result<(), SequencerError> {
        match HttpForwarder::new(url.to_string()) {
            Ok(forwarder) => {
                self.set_forwarder(Arc::new(forwarder));
                Ok(())
            }
            Err(err) => {
                tracing::error!(target: "rollup_node::sequencer", %err, "failed to set forward agent");
                Err(err)
            }
        }
    }

    /// Installs the provided forwarder.
    pub fn set_forwarder(&self, forwarder: Arc<dyn TransactionForwarder>) {
        *self.shared.forwarder.lock().expect("forwarder lock not poisoned") = Some(forwarder);
    }

    /// Stops forwarding; the node sequences locally again.
    pub fn dont_forward(&self) {
        *self.shared.forwarder.lock().expect("forwarder lock not poisoned") = None;
    }

    /// The peer endpoint submissions are forwarded to, if any.
    pub fn forward_target(&self) -> Option<String> {
        self.shared.forwarder().map(|forwarder| forwarder.target().to_string())
    }
}

impl std::fmt::Debug for SequencerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerHandle")
            .field("sender_whitelist", &self.sender_whitelist)
            .field("queue_timeout", &self.queue_timeout)
            .finish()
    }
}

/// Rejects user transactions that reverted while staying under the
/// configured compute-gas bound. Cheap reverts are kept out of blocks; large
/// ones are included so their gas is paid for.
#[derive(Debug, Clone, Copy)]
struct RevertProtection {
    max_revert_gas_reject: u64,
}

impl<S: SystemState> SequencingPolicy<S> for RevertProtection {
    fn post_tx_filter(
        &self,
        _state: &S,
        _tx: &Transaction,
        _sender: Address,
        data_gas: u64,
        receipt: &Receipt,
    ) -> Result<(), TxError> {
        if !receipt.success &&
            receipt.gas_used > data_gas &&
            receipt.gas_used - data_gas <= self.max_revert_gas_reject
        {
            return Err(TxError::ExecutionReverted)
        }
        Ok(())
    }
}

/// The sequencer: a single-producer loop draining the submission queue into
/// batches and driving block production.
pub struct Sequencer<ST, L1R> {
    streamer: ST,
    l1_reader: Option<L1R>,
    config: SequencerConfig,
    queue_rx: mpsc::Receiver<TxQueueItem>,
    queue_tx: mpsc::Sender<TxQueueItem>,
    shared: Arc<SequencerShared>,
    metrics: SequencerMetrics,
}

impl<ST, L1R> Sequencer<ST, L1R>
where
    ST: TransactionStreamer,
    L1R: L1HeaderReader,
{
    /// Creates a new sequencer and its submission handle.
    pub fn new(
        streamer: ST,
        l1_reader: Option<L1R>,
        config: SequencerConfig,
    ) -> Result<(Self, SequencerHandle), SequencerError> {
        let mut sender_whitelist = HashSet::new();
        for entry in config.sender_whitelist.split(',') {
            if entry.is_empty() {
                continue;
            }
            let address = Address::from_str(entry)
                .map_err(|_| SequencerError::InvalidWhitelistEntry(entry.to_string()))?;
            sender_whitelist.insert(address);
        }

        let (queue_tx, queue_rx) = mpsc::channel(TX_QUEUE_SIZE);
        let shared = Arc::new(SequencerShared::default());

        if let Some(target) = &config.forwarder_target {
            *shared.forwarder.lock().expect("forwarder lock not poisoned") =
                Some(Arc::new(HttpForwarder::new(target.clone())?));
        }

        let handle = SequencerHandle {
            queue_tx: queue_tx.clone(),
            shared: shared.clone(),
            sender_whitelist: Arc::new(sender_whitelist),
            queue_timeout: config.queue_timeout,
        };

        let sequencer = Self {
            streamer,
            l1_reader,
            config,
            queue_rx,
            queue_tx,
            shared,
            metrics: SequencerMetrics::default(),
        };

        Ok((sequencer, handle))
    }

    /// Seeds the L1 head snapshot from the reader's latest header. Must run
    /// before [`Self::start`] when an L1 reader is configured.
    pub async fn initialize(&self) -> Result<(), SequencerError> {
        if let Some(reader) = &self.l1_reader {
            let header = reader.last_header().await?;
            self.shared.update_latest_l1_block(header);
        }
        Ok(())
    }

    /// Spawns the L1 head subscriber and the batching loop. The loop exits
    /// when every submission handle is dropped.
    pub fn start(self) -> Result<tokio::task::JoinHandle<()>, SequencerError> {
        if let Some(reader) = &self.l1_reader {
            if self.shared.l1_snapshot().block_number == 0 {
                return Err(SequencerError::NotInitialized)
            }

            let mut headers = reader.subscribe();
            let shared = self.shared.clone();
            tokio::spawn(async move {
                while let Some(header) = headers.recv().await {
                    shared.update_latest_l1_block(header);
                }
            });
        }

        Ok(tokio::spawn(self.run()))
    }

    async fn run(mut self) {
        loop {
            let next_block = Instant::now() + self.config.max_block_speed;
            if !self.sequence_transactions().await {
                tracing::warn!(target: "rollup_node::sequencer", "submission queue closed, stopping the sequencer");
                return;
            }
            tokio::time::sleep_until(next_block).await;
        }
    }

    /// Drains the queue into one batch and sequences it. Returns false once
    /// the queue is closed and drained.
    async fn sequence_transactions(&mut self) -> bool {
        let mut txes: Vec<Transaction> = Vec::new();
        let mut queue_items: Vec<TxQueueItem> = Vec::new();
        let mut total_batch_size = 0usize;

        loop {
            let item = if txes.is_empty() {
                // block for the first item
                match self.queue_rx.recv().await {
                    Some(item) => item,
                    None => return false,
                }
            } else {
                // non-blocking polls afterwards; stop once momentarily empty
                match self.queue_rx.try_recv() {
                    Ok(item) => item,
                    Err(_) => break,
                }
            };

            if item.expired() {
                item.return_result(Err(SequencerError::ContextCancelled));
                continue;
            }

            let tx_size = item.tx.encoded_len();
            if tx_size > MAX_TX_BYTES {
                // this tx is too large
                item.return_result(Err(SequencerError::OversizedData));
                self.metrics.dropped_txs.increment(1);
                continue;
            }
            if total_batch_size + tx_size > MAX_TX_BYTES {
                // This tx would be too large to add to this batch.
                // Attempt to put it back in the queue, but error if the queue
                // is full. Then, end the batch here.
                if let Err(failed) = self.queue_tx.try_send(item) {
                    failed.into_inner().return_result(Err(SequencerError::OversizedData));
                }
                break;
            }

            total_batch_size += tx_size;
            txes.push(item.tx.clone());
            queue_items.push(item);
        }

        if self.forward_if_set(&mut queue_items).await {
            return true;
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time can't go backwards")
            .as_secs();
        let snapshot = self.shared.l1_snapshot();

        if self.l1_reader.is_some() &&
            (snapshot.block_number == 0 ||
                snapshot.timestamp.abs_diff(timestamp) >
                    self.config.max_acceptable_timestamp_delta.as_secs())
        {
            // submitters will time out
            tracing::error!(
                target: "rollup_node::sequencer",
                l1_block = snapshot.block_number,
                l1_timestamp = snapshot.timestamp,
                local_timestamp = timestamp,
                "cannot sequence: unknown L1 block or L1 timestamp too far from local clock time",
            );
            return true;
        }

        let header = L1IncomingMessageHeader {
            kind: L1MessageKind::L2Message,
            poster: BATCH_POSTER_ADDRESS,
            block_number: snapshot.block_number,
            timestamp,
            request_id: None,
            l1_base_fee: None,
        };

        let policy = RevertProtection { max_revert_gas_reject: self.config.max_revert_gas_reject };
        let mut hooks = SequencingHooks::new(&policy, true);

        match self.streamer.sequence_transactions(&header, &txes, &mut hooks) {
            Err(StreamerError::RetrySequencer) => {
                // we changed roles; forward if we have somewhere to
                if self.forward_if_set(&mut queue_items).await {
                    return true;
                }
                // try to add back to the queue otherwise
                for item in queue_items {
                    if let Err(failed) = self.queue_tx.try_send(item) {
                        failed.into_inner().return_result(Err(SequencerError::QueueFull));
                    }
                }
                return true;
            }
            Err(err) => {
                tracing::warn!(target: "rollup_node::sequencer", %err, "error sequencing transactions");
                let err = SequencerError::Streamer(err.to_string());
                for item in queue_items {
                    item.return_result(Err(err.clone()));
                }
                return true;
            }
            Ok(()) => {}
        }

        if hooks.tx_errors.len() != txes.len() {
            panic!(
                "unexpected number of error results: {} vs number of txes {}",
                hooks.tx_errors.len(),
                txes.len()
            );
        }

        self.metrics.sequenced_batches.increment(1);
        self.metrics.batch_size_bytes.record(total_batch_size as f64);

        for (error, item) in hooks.tx_errors.into_iter().zip(queue_items) {
            match error {
                Some(TxError::GasLimitReached) => {
                    // There's not enough gas left in the block for this tx.
                    // Attempt to re-queue the transaction. If the queue is
                    // full, fall through to returning an error.
                    if let Err(failed) = self.queue_tx.try_send(item) {
                        failed
                            .into_inner()
                            .return_result(Err(TxError::GasLimitReached.into()));
                        self.metrics.dropped_txs.increment(1);
                    }
                }
                Some(err) => {
                    item.return_result(Err(err.into()));
                    self.metrics.dropped_txs.increment(1);
                }
                None => {
                    item.return_result(Ok(()));
                    self.metrics.sequenced_txs.increment(1);
                }
            }
        }

        true
    }

    /// Forwards the whole batch to the peer endpoint, if one is installed.
    /// The forwarder is copied out under its lock and used after release.
    async fn forward_if_set(&self, queue_items: &mut Vec<TxQueueItem>) -> bool {
        let Some(forwarder) = self.shared.forwarder() else { return false };
        for item in queue_items.drain(..) {
            let result = forwarder.publish_transaction(&item.tx).await;
            self.metrics.forwarded_txs.increment(1);
            item.return_result(result);
        }
        true
    }
}

impl<ST, L1R> std::fmt::Debug for Sequencer<ST, L1R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("streamer", &"TransactionStreamer")
            .field("l1_reader", &"L1HeaderReader")
            .field("config", &self.config)
            .finish()
    }
}
