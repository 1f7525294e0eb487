use alloy_sol_types::sol;

sol! {
    /// The time bounds constraining the messages of a batch.
    #[derive(Debug, Default, PartialEq, Eq)]
    struct TimeBounds {
        uint64 minTimestamp;
        uint64 maxTimestamp;
        uint64 minBlockNumber;
        uint64 maxBlockNumber;
    }

    #[derive(Debug)]
    event SequencerBatchDelivered(
        uint256 indexed batchSequenceNumber,
        bytes32 indexed beforeAcc,
        bytes32 indexed afterAcc,
        bytes32 delayedAcc,
        uint256 afterDelayedMessagesRead,
        TimeBounds timeBounds,
        uint8 dataLocation
    );

    #[derive(Debug)]
    event SequencerBatchData(uint256 indexed batchSequenceNumber, bytes data);

    #[derive(Debug)]
    function addSequencerL2BatchFromOrigin(
        uint256 sequenceNumber,
        bytes calldata data,
        uint256 afterDelayedMessagesRead,
        address gasRefunder
    ) external;

    function batchCount() external view returns (uint256);

    function inboxAccs(uint256 index) external view returns (bytes32);
}
