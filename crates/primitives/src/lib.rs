//! Primitive types for the rollup node.

pub use block::{Block, BlockInfo};
mod block;

pub use constants::*;
mod constants;

pub use error::{MessageError, TransactionError};
mod error;

pub use events::{L2ToL1Transaction, L2ToL1Tx};
mod events;

pub use header::{BlockHeader, HeaderInfo};
mod header;

pub mod macros;

pub use message::{
    encode_l2_message_batch, L1IncomingMessage, L1IncomingMessageHeader, L1MessageKind,
};
mod message;

pub use receipt::Receipt;
mod receipt;

pub use transaction::{
    BatchPostingReportTx, DepositTx, InternalTx, RetryTx, SignedTransaction, StartBlockTx,
    SubmitRetryableTx, Transaction,
};
mod transaction;
