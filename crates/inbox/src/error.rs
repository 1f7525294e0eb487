use alloy_json_rpc::RpcError;
use alloy_primitives::B256;
use alloy_transport::TransportErrorKind;

/// An error occurring while reading sequencer batches from the L1 inbox.
#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    /// The execution provider failed.
    #[error("execution provider error: {0:?}")]
    Provider(#[from] RpcError<TransportErrorKind>),
    /// ABI decoding of a call or event failed.
    #[error(transparent)]
    Abi(#[from] alloy_sol_types::Error),
    /// A filtered log carries an unexpected selector.
    #[error("unexpected log selector")]
    UnexpectedLogSelector,
    /// A contract value announced as u64 does not fit one.
    #[error("sequencer inbox returned non-uint64 {0}")]
    NonUint64Field(&'static str),
    /// A log is missing a field the reader relies on.
    #[error("log is missing its {0}")]
    MissingLogField(&'static str),
    /// The batch-submitting transaction could not be found.
    #[error("missing transaction in block {0} at index {1}")]
    MissingTransaction(B256, u64),
    /// No separate data event matched the batch sequence number.
    #[error("expected to find sequencer batch data")]
    NoMatchingDataEvent,
    /// More than one separate data event matched the batch sequence number.
    #[error("expected to find only one matching sequencer batch data")]
    MultipleMatchingDataEvents,
    /// The delivery event names an unknown data location.
    #[error("batch has invalid data location {0}")]
    InvalidDataLocation(u8),
}
