/// An error occurring while encoding, decoding or recovering a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The leading type byte does not name a known transaction type.
    #[error("unsupported transaction type {0:#04x}")]
    UnsupportedType(u8),
    /// The `v` value of a legacy signature is malformed.
    #[error("invalid legacy signature v value {0}")]
    InvalidV(u64),
    /// An RLP error occurred.
    #[error(transparent)]
    Rlp(#[from] alloy_rlp::Error),
    /// Signer recovery failed.
    #[error(transparent)]
    Signature(#[from] alloy_primitives::SignatureError),
}

/// An error occurring while parsing an L1 incoming message into transactions.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The message kind is not one the node can parse.
    #[error("invalid L1 message kind {0}")]
    InvalidMessageKind(u8),
    /// The L2 message kind byte is unknown.
    #[error("unknown L2 message kind {0}")]
    UnknownL2MessageKind(u8),
    /// Nested batches exceeded the allowed depth.
    #[error("L2 message batch nesting too deep")]
    NestingTooDeep,
    /// The message body ended before all announced fields were read.
    #[error("truncated L1 message body")]
    Truncated,
    /// The message kind requires a request id but the header carries none.
    #[error("missing request id on L1 message")]
    MissingRequestId,
    /// A transaction in the message failed to decode.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// The batch fetcher callback failed. Distinguished from parse errors so
    /// callers can abort instead of producing an empty block.
    #[error("batch fetch failed: {0}")]
    BatchFetch(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
