use std::time::Duration;

/// Configuration for the sequencer.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Comma-separated hex addresses allowed to submit transactions. Empty
    /// means open admission.
    pub sender_whitelist: String,
    /// The minimum wall-clock spacing between block production attempts.
    pub max_block_speed: Duration,
    /// The tolerated skew between the cached L1 timestamp and the local
    /// clock. Sequencing refuses to run outside it.
    pub max_acceptable_timestamp_delta: Duration,
    /// Reverted transactions using no more compute gas than this are
    /// rejected instead of included.
    pub max_revert_gas_reject: u64,
    /// How long a submission may wait for its result before it is abandoned.
    pub queue_timeout: Duration,
    /// An optional peer endpoint to forward submissions to at startup.
    pub forwarder_target: Option<String>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            sender_whitelist: String::new(),
            max_block_speed: Duration::from_millis(250),
            max_acceptable_timestamp_delta: Duration::from_secs(3600),
            max_revert_gas_reject: 31_000,
            queue_timeout: Duration::from_secs(12),
            forwarder_target: None,
        }
    }
}
