use crate::{
    check_buf_len, from_be_bytes_slice_and_advance_buf, from_slice_and_advance_buf, DepositTx,
    InternalTx, MessageError, SubmitRetryableTx, Transaction,
};

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::Decodable;

/// The kind of an L1 inbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum L1MessageKind {
    /// A message carrying L2 transactions.
    L2Message = 3,
    /// A marker closing the current block.
    EndOfBlock = 6,
    /// A retryable ticket submission.
    SubmitRetryable = 9,
    /// The chain initialization message.
    Initialize = 11,
    /// An ether deposit.
    EthDeposit = 12,
    /// A report charging the poster for a posted batch.
    BatchPostingReport = 13,
}

impl TryFrom<u8> for L1MessageKind {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Self::L2Message),
            6 => Ok(Self::EndOfBlock),
            9 => Ok(Self::SubmitRetryable),
            11 => Ok(Self::Initialize),
            12 => Ok(Self::EthDeposit),
            13 => Ok(Self::BatchPostingReport),
            other => Err(MessageError::InvalidMessageKind(other)),
        }
    }
}

/// The header of an L1 inbox message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1IncomingMessageHeader {
    /// The kind of the message.
    pub kind: L1MessageKind,
    /// The account that posted the message.
    pub poster: Address,
    /// The L1 block number the message was observed at.
    pub block_number: u64,
    /// The L1 timestamp of the message.
    pub timestamp: u64,
    /// The id of the L1 request, absent for sequencer-originated messages.
    pub request_id: Option<B256>,
    /// The L1 base fee observed by the poster, absent for sequencer-originated
    /// messages.
    pub l1_base_fee: Option<U256>,
}

/// An L1 inbox message together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1IncomingMessage {
    /// The message header.
    pub header: L1IncomingMessageHeader,
    /// The message payload.
    pub l2_msg: Bytes,
}

/// L2 message kind: a batch of nested sub-messages, each prefixed with a
/// big-endian u64 length.
const L2_MSG_KIND_BATCH: u8 = 3;
/// L2 message kind: a single signed transaction in canonical encoding.
const L2_MSG_KIND_SIGNED_TX: u8 = 4;
/// The maximum nesting depth of batch sub-messages.
const MAX_BATCH_NESTING: usize = 16;

impl L1IncomingMessage {
    /// Parses the message into the transactions it carries.
    ///
    /// The batch fetcher resolves batch payload bytes by sequence number and
    /// is consulted for batch posting reports. Its failures surface as
    /// [`MessageError::BatchFetch`] so callers can distinguish them from
    /// malformed message bodies.
    pub fn parse_l2_transactions<F>(
        &self,
        chain_id: u64,
        mut batch_fetcher: F,
    ) -> Result<Vec<Transaction>, MessageError>
    where
        F: FnMut(u64) -> Result<Bytes, Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        match self.header.kind {
            L1MessageKind::L2Message => {
                let mut txs = Vec::new();
                parse_l2_message(&self.l2_msg, 0, &mut txs)?;
                Ok(txs)
            }
            L1MessageKind::EthDeposit => Ok(vec![self.parse_eth_deposit(chain_id)?]),
            L1MessageKind::SubmitRetryable => {
                let tx = SubmitRetryableTx::decode(&mut self.l2_msg.as_ref())
                    .map_err(crate::TransactionError::from)?;
                Ok(vec![Transaction::SubmitRetryable(tx)])
            }
            L1MessageKind::BatchPostingReport => {
                Ok(vec![self.parse_batch_posting_report(&mut batch_fetcher)?])
            }
            L1MessageKind::EndOfBlock => Ok(Vec::new()),
            L1MessageKind::Initialize => {
                Err(MessageError::InvalidMessageKind(L1MessageKind::Initialize as u8))
            }
        }
    }

    fn parse_eth_deposit(&self, chain_id: u64) -> Result<Transaction, MessageError> {
        let buf = &mut self.l2_msg.as_ref();
        check_buf_len!(buf, 20 + 32, MessageError::Truncated);

        let to = from_slice_and_advance_buf!(Address, buf);
        let value = U256::from_be_slice(&buf[..32]);

        Ok(Transaction::Deposit(DepositTx {
            chain_id,
            l1_request_id: self.header.request_id.ok_or(MessageError::MissingRequestId)?,
            from: self.header.poster,
            to,
            value,
        }))
    }

    fn parse_batch_posting_report<F>(&self, batch_fetcher: &mut F) -> Result<Transaction, MessageError>
    where
        F: FnMut(u64) -> Result<Bytes, Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        let buf = &mut self.l2_msg.as_ref();
        check_buf_len!(buf, 8 + 20 + 8 + 32, MessageError::Truncated);

        let batch_timestamp = from_be_bytes_slice_and_advance_buf!(u64, buf);
        let batch_poster_address = from_slice_and_advance_buf!(Address, buf);
        let batch_number = from_be_bytes_slice_and_advance_buf!(u64, buf);
        let l1_base_fee = U256::from_be_slice(&buf[..32]);

        let batch_data = batch_fetcher(batch_number).map_err(MessageError::BatchFetch)?;

        Ok(Transaction::Internal(InternalTx::BatchPostingReport(crate::BatchPostingReportTx {
            batch_timestamp,
            batch_poster_address,
            batch_number,
            batch_data_hash: keccak256(&batch_data),
            l1_base_fee,
        })))
    }
}

fn parse_l2_message(
    msg: &[u8],
    depth: usize,
    txs: &mut Vec<Transaction>,
) -> Result<(), MessageError> {
    let buf = &mut &*msg;
    check_buf_len!(buf, 1, MessageError::Truncated);
    let kind = from_be_bytes_slice_and_advance_buf!(u8, buf);

    match kind {
        L2_MSG_KIND_SIGNED_TX => {
            let tx = Transaction::decode_canonical(buf)?;
            txs.push(tx);
            Ok(())
        }
        L2_MSG_KIND_BATCH => {
            if depth >= MAX_BATCH_NESTING {
                return Err(MessageError::NestingTooDeep)
            }
            while !buf.is_empty() {
                check_buf_len!(buf, 8, MessageError::Truncated);
                let len = from_be_bytes_slice_and_advance_buf!(u64, buf) as usize;
                check_buf_len!(buf, len, MessageError::Truncated);
                parse_l2_message(&buf[..len], depth + 1, txs)?;
                alloy_primitives::bytes::Buf::advance(buf, len);
            }
            Ok(())
        }
        other => Err(MessageError::UnknownL2MessageKind(other)),
    }
}

/// Frames the provided transactions into a batch-kind L2 message.
pub fn encode_l2_message_batch(txs: &[Transaction]) -> Bytes {
    let mut out = vec![L2_MSG_KIND_BATCH];
    for tx in txs {
        let encoded = tx.encoded_canonical();
        out.extend_from_slice(&(1 + encoded.len() as u64).to_be_bytes());
        out.push(L2_MSG_KIND_SIGNED_TX);
        out.extend_from_slice(&encoded);
    }
    out.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, Signature, TxKind};

    fn header(kind: L1MessageKind) -> L1IncomingMessageHeader {
        L1IncomingMessageHeader {
            kind,
            poster: address!("00000000000000000000000000000000000000aa"),
            block_number: 12,
            timestamp: 1_700_000_000,
            request_id: Some(b256!(
                "0404040404040404040404040404040404040404040404040404040404040404"
            )),
            l1_base_fee: None,
        }
    }

    fn no_batches(_: u64) -> Result<Bytes, Box<dyn std::error::Error + Send + Sync + 'static>> {
        Err("no batches".into())
    }

    #[test]
    fn test_should_parse_batched_signed_txs() {
        let txs: Vec<_> = (0..3u64)
            .map(|nonce| {
                Transaction::Signed(crate::SignedTransaction {
                    chain_id: 412346,
                    nonce,
                    gas_price: U256::from(100u64),
                    gas_limit: 21_000,
                    to: TxKind::Call(address!("00000000000000000000000000000000000000bb")),
                    value: U256::ZERO,
                    input: Bytes::new(),
                    signature: Signature::new(U256::from(1u64), U256::from(1u64), false),
                })
            })
            .collect();

        let message = L1IncomingMessage {
            header: header(L1MessageKind::L2Message),
            l2_msg: encode_l2_message_batch(&txs),
        };

        let parsed = message.parse_l2_transactions(412346, no_batches).unwrap();
        assert_eq!(parsed, txs);
    }

    #[test]
    fn test_should_parse_eth_deposit() {
        let mut body = address!("00000000000000000000000000000000000000cc").to_vec();
        body.extend_from_slice(&U256::from(55u64).to_be_bytes::<32>());

        let message =
            L1IncomingMessage { header: header(L1MessageKind::EthDeposit), l2_msg: body.into() };

        let parsed = message.parse_l2_transactions(412346, no_batches).unwrap();
        let Transaction::Deposit(deposit) = &parsed[0] else { panic!("expected a deposit") };
        assert_eq!(deposit.value, U256::from(55u64));
        assert_eq!(deposit.to, address!("00000000000000000000000000000000000000cc"));
    }

    #[test]
    fn test_should_surface_batch_fetch_failure() {
        let mut body = 77u64.to_be_bytes().to_vec();
        body.extend_from_slice(address!("00000000000000000000000000000000000000aa").as_slice());
        body.extend_from_slice(&9u64.to_be_bytes());
        body.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>());

        let message = L1IncomingMessage {
            header: header(L1MessageKind::BatchPostingReport),
            l2_msg: body.into(),
        };

        let err = message.parse_l2_transactions(412346, no_batches).unwrap_err();
        assert!(matches!(err, MessageError::BatchFetch(_)));
    }
}
