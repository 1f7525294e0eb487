/// A per-transaction error raised during block production. Surfaced to
/// submitters through the sequencing hooks, parallel to the input
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    /// There is not enough gas left in the block for the transaction.
    #[error("gas limit reached")]
    GasLimitReached,
    /// The transaction does not afford its intrinsic gas.
    #[error("intrinsic gas too low")]
    IntrinsicGas,
    /// The transaction reverted and was rejected by the sequencing policy.
    #[error("execution reverted")]
    ExecutionReverted,
    /// The sender could not be recovered from the signature.
    #[error("invalid transaction signature")]
    InvalidSignature,
    /// The transaction was rejected by a sequencing filter.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The transaction is invalid under the state transition function.
    #[error("vm error: {0}")]
    Vm(String),
}

/// An error occurring while producing a block from an L1 inbox message.
#[derive(Debug, thiserror::Error)]
pub enum BlockProducerError {
    /// The batch fetcher failed while resolving referenced batch data.
    #[error("batch fetch failed: {0}")]
    BatchFetch(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
