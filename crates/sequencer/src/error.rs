use rollup_node_block_producer::TxError;

/// An error type for the sequencer, delivered to submitters through their
/// result channels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    /// The transaction sender is not on the configured whitelist.
    #[error("transaction sender is not on the whitelist")]
    SenderNotWhitelisted,
    /// The transaction, or the batch it would join, exceeds the size bound.
    #[error("oversized data")]
    OversizedData,
    /// The submission deadline elapsed or the sequencer went away.
    #[error("context cancelled")]
    ContextCancelled,
    /// The transaction queue is full.
    #[error("queue full")]
    QueueFull,
    /// The sender could not be recovered from the transaction signature.
    #[error("invalid transaction signature")]
    InvalidSignature,
    /// A whitelist entry is not a valid address.
    #[error("sequencer sender whitelist entry \"{0}\" is not a valid address")]
    InvalidWhitelistEntry(String),
    /// The sequencer was started before being initialized.
    #[error("sequencer not initialized")]
    NotInitialized,
    /// The L1 header reader failed.
    #[error("l1 reader error: {0}")]
    L1Reader(String),
    /// The transaction was dropped during block production.
    #[error(transparent)]
    Tx(#[from] TxError),
    /// The streamer failed to sequence the batch.
    #[error("error sequencing transactions: {0}")]
    Streamer(String),
    /// Forwarding the transaction to the peer endpoint failed.
    #[error("failed to forward transaction: {0}")]
    Forward(String),
}

/// An error returned by the transaction streamer for a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum StreamerError {
    /// The node lost the active sequencer role. The batch should be forwarded
    /// or re-queued, not failed.
    #[error("please retry transaction")]
    RetrySequencer,
    /// Any other batch-level failure, broadcast to every submitter.
    #[error("{0}")]
    Other(String),
}
