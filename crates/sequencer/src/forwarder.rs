use crate::SequencerError;

use alloy_provider::{Provider, RootProvider};
use rollup_node_primitives::Transaction;

/// The capability to publish a submission on a peer sequencer. Installed on
/// the sequencer when it is not (or no longer) the active one.
#[async_trait::async_trait]
pub trait TransactionForwarder: Send + Sync {
    /// The peer endpoint submissions are forwarded to.
    fn target(&self) -> &str;

    /// Publishes the transaction on the peer endpoint.
    async fn publish_transaction(&self, tx: &Transaction) -> Result<(), SequencerError>;
}

/// Forwards submissions to a peer sequencer over JSON-RPC.
#[derive(Debug)]
pub struct HttpForwarder {
    target: String,
    provider: RootProvider,
}

impl HttpForwarder {
    /// Returns a new forwarder publishing to the provided endpoint URL.
    pub fn new(target: String) -> Result<Self, SequencerError> {
        let url = url::Url::parse(&target).map_err(|err| SequencerError::Forward(err.to_string()))?;
        Ok(Self { target, provider: RootProvider::new_http(url) })
    }
}

#[async_trait::async_trait]
impl TransactionForwarder for HttpForwarder {
    fn target(&self) -> &str {
        &self.target
    }

    async fn publish_transaction(&self, tx: &Transaction) -> Result<(), SequencerError> {
        self.provider
            .send_raw_transaction(&tx.encoded_canonical())
            .await
            .map(|_| ())
            .map_err(|err| SequencerError::Forward(err.to_string()))
    }
}
