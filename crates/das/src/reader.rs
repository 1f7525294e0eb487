use crate::DasError;

use alloy_primitives::{Bytes, B256};
use std::{fmt, str::FromStr};

/// The capability consumed by the certificate verifier to fetch
/// content-addressed objects from the data availability layer.
#[async_trait::async_trait]
pub trait DataAvailabilityReader: Send + Sync {
    /// Fetches the bytes stored under the provided hash.
    async fn get_by_hash(&self, hash: B256) -> Result<Bytes, DasError>;
    /// Checks the health of the underlying store.
    async fn health_check(&self) -> Result<(), DasError>;
    /// Returns the expiration policy of the underlying store.
    async fn expiration_policy(&self) -> Result<ExpirationPolicy, DasError>;
}

/// How long a data availability store retains its objects. The integer values
/// are wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ExpirationPolicy {
    /// Data is kept forever.
    KeepForever = 0,
    /// Data is kept until the archive timeout of the archiving node.
    DiscardAfterArchiveTimeout = 1,
    /// Data is kept until the aggregator-provided timeout.
    DiscardAfterDataTimeout = 2,
    /// Mixed timeout policies behind one aggregator.
    MixedTimeout = 3,
    /// Data is never stored.
    DiscardImmediately = 4,
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeepForever => "KeepForever",
            Self::DiscardAfterArchiveTimeout => "DiscardAfterArchiveTimeout",
            Self::DiscardAfterDataTimeout => "DiscardAfterDataTimeout",
            Self::MixedTimeout => "MixedTimeout",
            Self::DiscardImmediately => "DiscardImmediately",
        };
        f.write_str(name)
    }
}

impl FromStr for ExpirationPolicy {
    type Err = DasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KeepForever" => Ok(Self::KeepForever),
            "DiscardAfterArchiveTimeout" => Ok(Self::DiscardAfterArchiveTimeout),
            "DiscardAfterDataTimeout" => Ok(Self::DiscardAfterDataTimeout),
            "MixedTimeout" => Ok(Self::MixedTimeout),
            "DiscardImmediately" => Ok(Self::DiscardImmediately),
            other => Err(DasError::UnknownExpirationPolicy(other.to_string())),
        }
    }
}
