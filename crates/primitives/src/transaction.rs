use crate::{
    constants::{
        DEPOSIT_TX_TYPE, INTERNAL_TX_SENDER, INTERNAL_TX_TYPE, RETRY_TX_TYPE,
        SUBMIT_RETRYABLE_TX_TYPE,
    },
    TransactionError,
};

use alloy_primitives::{keccak256, Address, Bytes, Signature, TxKind, B256, U256};
use alloy_rlp::{Buf, BufMut, Decodable, Encodable, Header, RlpDecodable, RlpEncodable};

/// A transaction processed by the rollup.
///
/// Signed transactions are submitted by users; the remaining variants are
/// derived from L1 messages or generated by the node itself. The canonical
/// encoding is EIP-2718 style: signed transactions encode as a legacy RLP
/// list, every other variant as a type byte followed by an RLP payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// A user transaction carrying a secp256k1 signature.
    Signed(SignedTransaction),
    /// An L1 -> L2 ether deposit.
    Deposit(DepositTx),
    /// A retryable ticket submission.
    SubmitRetryable(SubmitRetryableTx),
    /// A scheduled redeem of a retryable ticket.
    Retry(RetryTx),
    /// A node-generated transaction.
    Internal(InternalTx),
}

impl Transaction {
    /// Returns the EIP-2718 type byte, or `None` for legacy signed transactions.
    pub const fn tx_type(&self) -> Option<u8> {
        match self {
            Self::Signed(_) => None,
            Self::Deposit(_) => Some(DEPOSIT_TX_TYPE),
            Self::SubmitRetryable(_) => Some(SUBMIT_RETRYABLE_TX_TYPE),
            Self::Retry(_) => Some(RETRY_TX_TYPE),
            Self::Internal(_) => Some(INTERNAL_TX_TYPE),
        }
    }

    /// Whether the transaction was generated by the node rather than submitted by a user
    /// or derived from an L1 request.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Returns the transaction as a retryable redeem, if it is one.
    pub const fn as_retry(&self) -> Option<&RetryTx> {
        match self {
            Self::Retry(tx) => Some(tx),
            _ => None,
        }
    }

    /// The gas limit the transaction brings to execution.
    pub const fn gas(&self) -> u64 {
        match self {
            Self::Signed(tx) => tx.gas_limit,
            Self::SubmitRetryable(tx) => tx.gas,
            Self::Retry(tx) => tx.gas,
            Self::Deposit(_) | Self::Internal(_) => 0,
        }
    }

    /// Recovers the account the transaction executes as. Only signed
    /// transactions require an actual signature recovery.
    pub fn recover_sender(&self) -> Result<Address, TransactionError> {
        match self {
            Self::Signed(tx) => Ok(tx.recover_signer()?),
            Self::Deposit(tx) => Ok(tx.from),
            Self::SubmitRetryable(tx) => Ok(tx.from),
            Self::Retry(tx) => Ok(tx.from),
            Self::Internal(_) => Ok(INTERNAL_TX_SENDER),
        }
    }

    /// Encodes the transaction into its canonical binary form.
    pub fn encode_canonical(&self, out: &mut dyn BufMut) {
        match self {
            Self::Signed(tx) => tx.encode(out),
            Self::Deposit(tx) => {
                out.put_u8(DEPOSIT_TX_TYPE);
                tx.encode(out);
            }
            Self::SubmitRetryable(tx) => {
                out.put_u8(SUBMIT_RETRYABLE_TX_TYPE);
                tx.encode(out);
            }
            Self::Retry(tx) => {
                out.put_u8(RETRY_TX_TYPE);
                tx.encode(out);
            }
            Self::Internal(tx) => {
                out.put_u8(INTERNAL_TX_TYPE);
                tx.encode(out);
            }
        }
    }

    /// Returns the canonical encoding as a freshly allocated buffer.
    pub fn encoded_canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_canonical(&mut out);
        out
    }

    /// The length of the canonical encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Signed(tx) => tx.length(),
            Self::Deposit(tx) => 1 + tx.length(),
            Self::SubmitRetryable(tx) => 1 + tx.length(),
            Self::Retry(tx) => 1 + tx.length(),
            Self::Internal(tx) => 1 + tx.length(),
        }
    }

    /// Decodes a transaction from its canonical binary form, consuming the buffer.
    pub fn decode_canonical(buf: &mut &[u8]) -> Result<Self, TransactionError> {
        let first = *buf.first().ok_or(alloy_rlp::Error::InputTooShort)?;
        match first {
            // legacy RLP lists start at 0xc0
            b if b >= 0xc0 => Ok(Self::Signed(SignedTransaction::decode(buf)?)),
            DEPOSIT_TX_TYPE => {
                buf.advance(1);
                Ok(Self::Deposit(DepositTx::decode(buf)?))
            }
            SUBMIT_RETRYABLE_TX_TYPE => {
                buf.advance(1);
                Ok(Self::SubmitRetryable(SubmitRetryableTx::decode(buf)?))
            }
            RETRY_TX_TYPE => {
                buf.advance(1);
                Ok(Self::Retry(RetryTx::decode(buf)?))
            }
            INTERNAL_TX_TYPE => {
                buf.advance(1);
                Ok(Self::Internal(InternalTx::decode(buf)?))
            }
            b => Err(TransactionError::UnsupportedType(b)),
        }
    }

    /// Computes the transaction hash over the canonical encoding.
    pub fn hash_slow(&self) -> B256 {
        keccak256(self.encoded_canonical())
    }
}

/// A signed user transaction in the legacy (EIP-155) format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// The chain id the signature commits to. Zero for pre-EIP-155 signatures.
    pub chain_id: u64,
    /// The sender account nonce.
    pub nonce: u64,
    /// The price per unit of gas.
    pub gas_price: U256,
    /// The gas limit.
    pub gas_limit: u64,
    /// Call target, or create.
    pub to: TxKind,
    /// The ether value transferred.
    pub value: U256,
    /// The calldata.
    pub input: Bytes,
    /// The secp256k1 signature.
    pub signature: Signature,
}

impl SignedTransaction {
    /// The `v` value carried on the wire for this signature.
    pub fn v(&self) -> u64 {
        let parity = self.signature.v() as u64;
        if self.chain_id == 0 {
            27 + parity
        } else {
            35 + 2 * self.chain_id + parity
        }
    }

    /// The hash the signature covers.
    pub fn signature_hash(&self) -> B256 {
        let mut payload_length = self.fields_rlp_length();
        if self.chain_id != 0 {
            // EIP-155 appends (chain_id, 0, 0)
            payload_length += self.chain_id.length() + 2;
        }
        let mut buf = Vec::with_capacity(payload_length + 3);
        Header { list: true, payload_length }.encode(&mut buf);
        self.encode_fields(&mut buf);
        if self.chain_id != 0 {
            self.chain_id.encode(&mut buf);
            0u8.encode(&mut buf);
            0u8.encode(&mut buf);
        }
        keccak256(&buf)
    }

    /// Recovers the signer address from the signature.
    pub fn recover_signer(&self) -> Result<Address, alloy_primitives::SignatureError> {
        self.signature.recover_address_from_prehash(&self.signature_hash())
    }

    fn fields_rlp_length(&self) -> usize {
        self.nonce.length() +
            self.gas_price.length() +
            self.gas_limit.length() +
            self.to.length() +
            self.value.length() +
            self.input.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.input.encode(out);
    }

    fn rlp_payload_length(&self) -> usize {
        self.fields_rlp_length() +
            self.v().length() +
            self.signature.r().length() +
            self.signature.s().length()
    }
}

impl Encodable for SignedTransaction {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: true, payload_length: self.rlp_payload_length() }.encode(out);
        self.encode_fields(out);
        self.v().encode(out);
        self.signature.r().encode(out);
        self.signature.s().encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.rlp_payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for SignedTransaction {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString)
        }
        if buf.len() < header.payload_length {
            return Err(alloy_rlp::Error::InputTooShort)
        }
        let mut body = &buf[..header.payload_length];

        let nonce = u64::decode(&mut body)?;
        let gas_price = U256::decode(&mut body)?;
        let gas_limit = u64::decode(&mut body)?;
        let to = TxKind::decode(&mut body)?;
        let value = U256::decode(&mut body)?;
        let input = Bytes::decode(&mut body)?;
        let v = u64::decode(&mut body)?;
        let r = U256::decode(&mut body)?;
        let s = U256::decode(&mut body)?;
        if !body.is_empty() {
            return Err(alloy_rlp::Error::UnexpectedLength)
        }
        buf.advance(header.payload_length);

        let (chain_id, y_parity) = match v {
            27 | 28 => (0, v == 28),
            v if v >= 35 => ((v - 35) / 2, (v - 35) % 2 == 1),
            _ => return Err(alloy_rlp::Error::Custom("invalid signature v value")),
        };

        Ok(Self {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            input,
            signature: Signature::new(r, s, y_parity),
        })
    }
}

/// An L1 -> L2 ether deposit derived from an inbox message.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct DepositTx {
    /// The chain id of the rollup.
    pub chain_id: u64,
    /// The id of the originating L1 request.
    pub l1_request_id: B256,
    /// The depositing account.
    pub from: Address,
    /// The credited account.
    pub to: Address,
    /// The deposited value.
    pub value: U256,
}

/// A retryable ticket submission derived from an inbox message.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct SubmitRetryableTx {
    /// The chain id of the rollup.
    pub chain_id: u64,
    /// The id of the originating L1 request, which doubles as the ticket id.
    pub request_id: B256,
    /// The submitting account.
    pub from: Address,
    /// The L1 base fee observed at submission.
    pub l1_base_fee: U256,
    /// The ether deposited alongside the submission.
    pub deposit_value: U256,
    /// The maximum fee per gas for the scheduled redeem.
    pub gas_fee_cap: U256,
    /// The gas limit for the scheduled redeem.
    pub gas: u64,
    /// The target of the retryable call.
    pub retry_to: TxKind,
    /// The value of the retryable call.
    pub retry_value: U256,
    /// The account credited with any leftover deposit.
    pub beneficiary: Address,
    /// The maximum fee paid for ticket submission.
    pub max_submission_fee: U256,
    /// The account refunded for submission fee overpayment.
    pub fee_refund_address: Address,
    /// The calldata of the retryable call.
    pub retry_data: Bytes,
}

/// A scheduled redeem of a retryable ticket.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct RetryTx {
    /// The chain id of the rollup.
    pub chain_id: u64,
    /// The redeemer account nonce.
    pub nonce: u64,
    /// The redeemer account.
    pub from: Address,
    /// The maximum fee per gas.
    pub gas_fee_cap: U256,
    /// The gas limit.
    pub gas: u64,
    /// The call target.
    pub to: TxKind,
    /// The call value.
    pub value: U256,
    /// The calldata.
    pub data: Bytes,
    /// The retryable ticket being redeemed.
    pub ticket_id: B256,
    /// The account refunded for unused gas.
    pub refund_to: Address,
    /// The maximum gas refund.
    pub max_refund: U256,
    /// The submission fee refunded on success.
    pub submission_fee_refund: U256,
}

/// A node-generated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalTx {
    /// The synthetic transaction prepended to every block.
    StartBlock(StartBlockTx),
    /// A batch posting report charging the poster for batch data.
    BatchPostingReport(BatchPostingReportTx),
}

const INTERNAL_START_BLOCK: u8 = 0;
const INTERNAL_BATCH_POSTING_REPORT: u8 = 1;

impl Encodable for InternalTx {
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            Self::StartBlock(tx) => {
                out.put_u8(INTERNAL_START_BLOCK);
                tx.encode(out);
            }
            Self::BatchPostingReport(tx) => {
                out.put_u8(INTERNAL_BATCH_POSTING_REPORT);
                tx.encode(out);
            }
        }
    }

    fn length(&self) -> usize {
        1 + match self {
            Self::StartBlock(tx) => tx.length(),
            Self::BatchPostingReport(tx) => tx.length(),
        }
    }
}

impl Decodable for InternalTx {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let kind = *buf.first().ok_or(alloy_rlp::Error::InputTooShort)?;
        buf.advance(1);
        match kind {
            INTERNAL_START_BLOCK => Ok(Self::StartBlock(StartBlockTx::decode(buf)?)),
            INTERNAL_BATCH_POSTING_REPORT => {
                Ok(Self::BatchPostingReport(BatchPostingReportTx::decode(buf)?))
            }
            _ => Err(alloy_rlp::Error::Custom("unknown internal transaction kind")),
        }
    }
}

/// The synthetic start-of-block transaction. Updates the L1 block number and
/// the pricing pools deterministically before any other transaction runs.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct StartBlockTx {
    /// The chain id of the rollup.
    pub chain_id: u64,
    /// The L1 base fee observed by the poster, if any.
    pub l1_base_fee: U256,
    /// The L1 block number the new block is pinned to.
    pub l1_block_number: u64,
    /// The number of the block being produced.
    pub l2_block_number: u64,
    /// Seconds elapsed since the previous block.
    pub time_passed: u64,
}

/// A batch posting report, charging the batch poster for posted data.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BatchPostingReportTx {
    /// The L1 timestamp of the batch.
    pub batch_timestamp: u64,
    /// The account that posted the batch.
    pub batch_poster_address: Address,
    /// The sequence number of the batch.
    pub batch_number: u64,
    /// The keccak hash of the batch data.
    pub batch_data_hash: B256,
    /// The L1 base fee the poster paid.
    pub l1_base_fee: U256,
}

impl StartBlockTx {
    /// Builds the start-of-block transaction for a new block.
    pub fn new(
        chain_id: u64,
        l1_base_fee: Option<U256>,
        l1_block_number: u64,
        l2_block_number: u64,
        timestamp: u64,
        prev_timestamp: u64,
    ) -> Self {
        Self {
            chain_id,
            l1_base_fee: l1_base_fee.unwrap_or_default(),
            l1_block_number,
            l2_block_number,
            time_passed: timestamp.saturating_sub(prev_timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, bytes, U256};

    fn signed_tx(input: Bytes) -> SignedTransaction {
        SignedTransaction {
            chain_id: 412346,
            nonce: 7,
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: 100_000,
            to: TxKind::Call(address!("00000000000000000000000000000000000000aa")),
            value: U256::from(42u64),
            input,
            signature: Signature::new(U256::from(1u64), U256::from(2u64), false),
        }
    }

    #[test]
    fn test_should_roundtrip_signed_transaction() {
        let tx = Transaction::Signed(signed_tx(bytes!("deadbeef")));
        let encoded = tx.encoded_canonical();
        assert_eq!(encoded.len(), tx.encoded_len());

        let decoded = Transaction::decode_canonical(&mut encoded.as_slice()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_should_roundtrip_typed_transactions() {
        let txs = vec![
            Transaction::Deposit(DepositTx {
                chain_id: 412346,
                l1_request_id: b256!(
                    "0101010101010101010101010101010101010101010101010101010101010101"
                ),
                from: address!("00000000000000000000000000000000000000bb"),
                to: address!("00000000000000000000000000000000000000cc"),
                value: U256::from(10u64),
            }),
            Transaction::Internal(InternalTx::StartBlock(StartBlockTx::new(
                412346,
                Some(U256::from(7u64)),
                100,
                5,
                1_700_000_010,
                1_700_000_000,
            ))),
            Transaction::Retry(RetryTx {
                chain_id: 412346,
                nonce: 0,
                from: address!("00000000000000000000000000000000000000dd"),
                gas_fee_cap: U256::from(2u64),
                gas: 50_000,
                to: TxKind::Call(address!("00000000000000000000000000000000000000ee")),
                value: U256::ZERO,
                data: bytes!("00"),
                ticket_id: b256!(
                    "0202020202020202020202020202020202020202020202020202020202020202"
                ),
                refund_to: address!("00000000000000000000000000000000000000ff"),
                max_refund: U256::ZERO,
                submission_fee_refund: U256::ZERO,
            }),
        ];

        for tx in txs {
            let encoded = tx.encoded_canonical();
            let decoded = Transaction::decode_canonical(&mut encoded.as_slice()).unwrap();
            assert_eq!(decoded, tx);
        }
    }

    #[test]
    fn test_should_reject_unknown_type_byte() {
        let buf = [0x7fu8, 0x00];
        let err = Transaction::decode_canonical(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, TransactionError::UnsupportedType(0x7f)));
    }
}
