use metrics::Counter;
use metrics_derive::Metrics;

/// The metrics for the [`super::SequencerInbox`].
#[derive(Metrics, Clone)]
#[metrics(scope = "inbox")]
pub struct InboxMetrics {
    /// A counter on the batch delivery events read.
    pub batches_read: Counter,
}
