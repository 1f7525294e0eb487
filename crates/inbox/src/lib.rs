//! Reader for sequencer batches delivered to the L1 inbox contract.
//!
//! Scans L1 logs for batch delivery events, resolves each batch's payload
//! from its announced data location, and produces the canonical serialized
//! batch handed to the replay path: a 40-byte time-bounds header followed by
//! the raw payload bytes.

pub mod abi;

pub use error::InboxError;
mod error;

pub use metrics::InboxMetrics;
mod metrics;

use abi::{
    addSequencerL2BatchFromOriginCall, batchCountCall, inboxAccsCall, SequencerBatchData,
    SequencerBatchDelivered, TimeBounds,
};

use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Log, TransactionInput, TransactionRequest, TransactionTrait};
use alloy_sol_types::{SolCall, SolEvent};

/// Where a delivered batch's payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchDataLocation {
    /// The payload is the calldata of the submitting transaction.
    TxInput = 0,
    /// The payload was emitted in a separate data event.
    SeparateEvent = 1,
    /// The batch carries no payload (force inclusion).
    NoData = 2,
}

impl TryFrom<u8> for BatchDataLocation {
    type Error = InboxError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::TxInput),
            1 => Ok(Self::SeparateEvent),
            2 => Ok(Self::NoData),
            other => Err(InboxError::InvalidDataLocation(other)),
        }
    }
}

/// A view over the sequencer inbox contract on the L1.
#[derive(Debug)]
pub struct SequencerInbox<P> {
    /// The L1 execution node provider.
    provider: P,
    /// The address of the inbox contract.
    address: Address,
    /// The L1 block the inbox was deployed at. Queries below it short-circuit
    /// to zero batches without a network call.
    from_block: u64,
    /// The metrics for the inbox reader.
    metrics: InboxMetrics,
}

impl<P: Provider> SequencerInbox<P> {
    /// Returns a new instance of the [`SequencerInbox`].
    pub fn new(provider: P, address: Address, from_block: u64) -> Self {
        Self { provider, address, from_block, metrics: InboxMetrics::default() }
    }

    /// Returns the total number of batches delivered as of the provided L1
    /// block.
    pub async fn get_batch_count(&self, block_number: u64) -> Result<u64, InboxError> {
        if block_number < self.from_block {
            return Ok(0)
        }
        let request = TransactionRequest {
            to: Some(TxKind::Call(self.address)),
            input: TransactionInput::new(batchCountCall {}.abi_encode().into()),
            ..Default::default()
        };
        let returndata = self.provider.call(request).block(block_number.into()).await?;
        let count = batchCountCall::abi_decode_returns(&returndata)?;
        u64::try_from(count).map_err(|_| InboxError::NonUint64Field("batch count"))
    }

    /// Returns the cumulative inbox accumulator at the provided sequence
    /// number, as of the provided L1 block.
    pub async fn get_accumulator(
        &self,
        sequence_number: u64,
        block_number: u64,
    ) -> Result<B256, InboxError> {
        let call = inboxAccsCall { index: U256::from(sequence_number) };
        let request = TransactionRequest {
            to: Some(TxKind::Call(self.address)),
            input: TransactionInput::new(call.abi_encode().into()),
            ..Default::default()
        };
        let returndata = self.provider.call(request).block(block_number.into()).await?;
        Ok(inboxAccsCall::abi_decode_returns(&returndata)?)
    }

    /// Scans the provided L1 block range for batch delivery events.
    pub async fn lookup_batches_in_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<SequencerInboxBatch>, InboxError> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(SequencerBatchDelivered::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);
        let logs = self.provider.get_logs(&filter).await?;

        tracing::trace!(target: "rollup_node::inbox", from, to, count = logs.len(), "found batch delivery logs");

        let batches = logs
            .iter()
            .map(SequencerInboxBatch::try_from_log)
            .collect::<Result<Vec<_>, _>>()?;
        self.metrics.batches_read.increment(batches.len() as u64);
        Ok(batches)
    }
}

/// A batch delivered to the sequencer inbox, parsed from its delivery event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerInboxBatch {
    /// The hash of the L1 block carrying the delivery event.
    pub block_hash: B256,
    /// The number of the L1 block carrying the delivery event.
    pub block_number: u64,
    /// The sequence number of the batch.
    pub sequence_number: u64,
    /// The inbox accumulator before the batch.
    pub before_inbox_acc: B256,
    /// The inbox accumulator after the batch.
    pub after_inbox_acc: B256,
    /// The delayed-inbox accumulator after the batch.
    pub after_delayed_acc: B256,
    /// The count of delayed messages read after the batch.
    pub after_delayed_count: u64,
    /// The time bounds of the batch.
    pub time_bounds: TimeBounds,
    /// The index of the submitting transaction within its block.
    tx_index_in_block: u64,
    /// Where the batch payload lives.
    data_location: BatchDataLocation,
    /// The address the delivery event was emitted from.
    bridge_address: Address,
    /// The cached serialization, if any.
    serialized: Option<Bytes>,
}

impl SequencerInboxBatch {
    /// Parses a batch delivery log into a batch descriptor.
    pub fn try_from_log(log: &Log) -> Result<Self, InboxError> {
        if log.topic0() != Some(&SequencerBatchDelivered::SIGNATURE_HASH) {
            return Err(InboxError::UnexpectedLogSelector)
        }
        let event = SequencerBatchDelivered::decode_log(&log.inner)?.data;

        let sequence_number = u64::try_from(event.batchSequenceNumber)
            .map_err(|_| InboxError::NonUint64Field("sequence number"))?;
        let after_delayed_count = u64::try_from(event.afterDelayedMessagesRead)
            .map_err(|_| InboxError::NonUint64Field("delayed messages read"))?;

        Ok(Self {
            block_hash: log.block_hash.ok_or(InboxError::MissingLogField("block hash"))?,
            block_number: log.block_number.ok_or(InboxError::MissingLogField("block number"))?,
            sequence_number,
            before_inbox_acc: event.beforeAcc,
            after_inbox_acc: event.afterAcc,
            after_delayed_acc: event.delayedAcc,
            after_delayed_count,
            time_bounds: event.timeBounds,
            tx_index_in_block: log
                .transaction_index
                .ok_or(InboxError::MissingLogField("transaction index"))?,
            data_location: BatchDataLocation::try_from(event.dataLocation)?,
            bridge_address: log.address(),
            serialized: None,
        })
    }

    /// Resolves the raw payload bytes of the batch from its data location.
    pub async fn data<P: Provider>(&self, provider: &P) -> Result<Bytes, InboxError> {
        match self.data_location {
            BatchDataLocation::TxInput => {
                let tx = provider
                    .get_transaction_by_block_hash_and_index(
                        self.block_hash,
                        self.tx_index_in_block as usize,
                    )
                    .await?
                    .ok_or(InboxError::MissingTransaction(
                        self.block_hash,
                        self.tx_index_in_block,
                    ))?;
                let call = addSequencerL2BatchFromOriginCall::abi_decode(tx.input())?;
                Ok(call.data)
            }
            BatchDataLocation::SeparateEvent => {
                let sequence_topic = B256::from(U256::from(self.sequence_number));
                let filter = Filter::new()
                    .address(self.bridge_address)
                    .event_signature(SequencerBatchData::SIGNATURE_HASH)
                    .topic1(sequence_topic)
                    .at_block_hash(self.block_hash);
                let logs = provider.get_logs(&filter).await?;
                if logs.is_empty() {
                    return Err(InboxError::NoMatchingDataEvent)
                }
                if logs.len() > 1 {
                    return Err(InboxError::MultipleMatchingDataEvents)
                }
                let event = SequencerBatchData::decode_log(&logs[0].inner)?.data;
                Ok(event.data)
            }
            // no data when in a force inclusion batch
            BatchDataLocation::NoData => Ok(Bytes::new()),
        }
    }

    /// Serializes the batch into its canonical form: the five big-endian
    /// time-bound fields followed by the payload bytes. The result is cached.
    pub async fn serialize<P: Provider>(&mut self, provider: &P) -> Result<Bytes, InboxError> {
        if let Some(serialized) = &self.serialized {
            return Ok(serialized.clone())
        }

        let data = self.data(provider).await?;
        let serialized: Bytes = self.encode_with_data(&data).into();
        self.serialized = Some(serialized.clone());
        Ok(serialized)
    }

    fn encode_with_data(&self, data: &[u8]) -> Vec<u8> {
        let header = [
            self.time_bounds.minTimestamp,
            self.time_bounds.maxTimestamp,
            self.time_bounds.minBlockNumber,
            self.time_bounds.maxBlockNumber,
            self.after_delayed_count,
        ];
        let mut out = Vec::with_capacity(40 + data.len());
        for bound in header {
            out.extend_from_slice(&bound.to_be_bytes());
        }
        out.extend_from_slice(data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, LogData};
    use alloy_sol_types::SolEvent;

    fn delivered_event() -> SequencerBatchDelivered {
        SequencerBatchDelivered {
            batchSequenceNumber: U256::from(7u64),
            beforeAcc: b256!("0101010101010101010101010101010101010101010101010101010101010101"),
            afterAcc: b256!("0202020202020202020202020202020202020202020202020202020202020202"),
            delayedAcc: b256!("0303030303030303030303030303030303030303030303030303030303030303"),
            afterDelayedMessagesRead: U256::from(4u64),
            timeBounds: TimeBounds {
                minTimestamp: 10,
                maxTimestamp: 20,
                minBlockNumber: 30,
                maxBlockNumber: 40,
            },
            dataLocation: 0,
        }
    }

    fn delivered_log(event: &SequencerBatchDelivered) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: address!("00000000000000000000000000000000000000ee"),
                data: event.encode_log_data(),
            },
            block_hash: Some(b256!(
                "0404040404040404040404040404040404040404040404040404040404040404"
            )),
            block_number: Some(100),
            transaction_index: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_should_parse_batch_from_delivery_log() -> eyre::Result<()> {
        let event = delivered_event();
        let batch = SequencerInboxBatch::try_from_log(&delivered_log(&event))?;

        assert_eq!(batch.sequence_number, 7);
        assert_eq!(batch.after_delayed_count, 4);
        assert_eq!(batch.before_inbox_acc, event.beforeAcc);
        assert_eq!(batch.data_location, BatchDataLocation::TxInput);
        assert_eq!(batch.time_bounds, event.timeBounds);
        assert_eq!(batch.block_number, 100);

        Ok(())
    }

    #[test]
    fn test_should_reject_unexpected_selector() {
        let event = delivered_event();
        let mut log = delivered_log(&event);
        let mut data = log.inner.data.clone();
        let mut topics = data.topics().to_vec();
        topics[0] = B256::repeat_byte(0xff);
        data = LogData::new_unchecked(topics, data.data.clone());
        log.inner.data = data;

        let err = SequencerInboxBatch::try_from_log(&log).unwrap_err();
        assert!(matches!(err, InboxError::UnexpectedLogSelector));
    }

    #[test]
    fn test_should_reject_non_uint64_sequence_number() {
        let mut event = delivered_event();
        event.batchSequenceNumber = U256::MAX;
        let err = SequencerInboxBatch::try_from_log(&delivered_log(&event)).unwrap_err();
        assert!(matches!(err, InboxError::NonUint64Field("sequence number")));
    }

    #[test]
    fn test_should_reject_invalid_data_location() {
        let mut event = delivered_event();
        event.dataLocation = 9;
        let err = SequencerInboxBatch::try_from_log(&delivered_log(&event)).unwrap_err();
        assert!(matches!(err, InboxError::InvalidDataLocation(9)));
    }

    #[test]
    fn test_should_serialize_time_bounds_header() -> eyre::Result<()> {
        let event = delivered_event();
        let batch = SequencerInboxBatch::try_from_log(&delivered_log(&event))?;

        let payload = [0xaau8; 3];
        let serialized = batch.encode_with_data(&payload);

        assert_eq!(serialized.len(), 40 + payload.len());
        assert_eq!(&serialized[..8], &10u64.to_be_bytes());
        assert_eq!(&serialized[8..16], &20u64.to_be_bytes());
        assert_eq!(&serialized[16..24], &30u64.to_be_bytes());
        assert_eq!(&serialized[24..32], &40u64.to_be_bytes());
        assert_eq!(&serialized[32..40], &4u64.to_be_bytes());
        assert_eq!(&serialized[40..], &payload);

        Ok(())
    }
}
