//! Events emitted by the system precompile at [`crate::SYSTEM_ADDRESS`].

use alloy_sol_types::sol;

sol! {
    /// An L2 -> L1 transaction recorded in the outbox. Deprecated shape kept
    /// for chains that predate the positional event below.
    #[derive(Debug)]
    event L2ToL1Transaction(
        address caller,
        address indexed destination,
        uint256 indexed uniqueId,
        uint256 indexed batchNumber,
        uint256 indexInBatch,
        uint256 arbBlockNum,
        uint256 ethBlockNum,
        uint256 timestamp,
        uint256 callvalue,
        bytes data
    );

    /// An L2 -> L1 transaction recorded in the outbox.
    #[derive(Debug)]
    event L2ToL1Tx(
        address caller,
        address indexed destination,
        uint256 indexed hash,
        uint256 indexed position,
        uint256 arbBlockNum,
        uint256 ethBlockNum,
        uint256 timestamp,
        uint256 callvalue,
        bytes data
    );
}
