/// An error occurring while decoding or verifying data availability
/// certificates and keysets.
#[derive(Debug, thiserror::Error)]
pub enum DasError {
    /// The message does not carry the DAS header flag.
    #[error("tried to deserialize a message that doesn't have the DAS header")]
    MissingDasHeader,
    /// The input ended before all announced fields were read.
    #[error("end of file")]
    Eof,
    /// The fetched keyset bytes do not hash to the certificate's keyset hash.
    #[error("keyset hash does not match the certificate")]
    HashMismatch,
    /// The keyset serialization exceeds the tree bin size.
    #[error("keyset too large")]
    KeysetTooLarge,
    /// The keyset announces more keys than fit the signers mask.
    #[error("too many keys in serialized keyset: {0}")]
    TooManyKeys(u64),
    /// A serialized integer field is malformed.
    #[error("malformed variable-length integer")]
    InvalidInteger,
    /// A public key failed to decode as a curve point.
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    /// A signature failed to decode as a curve point.
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,
    /// Too few committee members signed the certificate.
    #[error("not enough signers: {non_signers} non-signers with assumed honest {assumed_honest}")]
    NotEnoughSigners {
        /// The number of committee members missing from the aggregate.
        non_signers: u64,
        /// The honesty threshold of the keyset.
        assumed_honest: u64,
    },
    /// The aggregate signature does not verify over the signable fields.
    #[error("bad signature")]
    BadSignature,
    /// The expiration policy value is unknown.
    #[error("unknown expiration policy: {0}")]
    UnknownExpirationPolicy(String),
    /// The data availability reader failed.
    #[error("data availability reader error: {0}")]
    Reader(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
