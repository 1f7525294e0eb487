use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// The metrics for the [`super::Sequencer`].
#[derive(Metrics, Clone)]
#[metrics(scope = "sequencer")]
pub struct SequencerMetrics {
    /// A counter on the transactions sequenced into blocks.
    pub sequenced_txs: Counter,
    /// A counter on the transactions dropped with an error.
    pub dropped_txs: Counter,
    /// A counter on the transactions forwarded to a peer.
    pub forwarded_txs: Counter,
    /// A counter on the batches handed to the streamer.
    pub sequenced_batches: Counter,
    /// A histogram of batch sizes in bytes.
    pub batch_size_bytes: Histogram,
}
