//! Data availability certificate codec and verifier.
//!
//! A certificate is a short L1-posted object attesting that an off-chain
//! committee jointly holds the batch payload identified by its data hash.
//! Verification recovers the committee keyset from a content-addressed store
//! and checks the aggregate BLS signature under the keyset's honesty
//! threshold.

pub mod bls;

pub use error::DasError;
mod error;

pub use keyset::{Keyset, MAX_KEYSET_SIZE};
mod keyset;

pub use reader::{DataAvailabilityReader, ExpirationPolicy};
mod reader;

pub mod tree;

use alloy_primitives::B256;
use rollup_node_primitives::{
    check_buf_len, from_be_bytes_slice_and_advance_buf, from_slice_and_advance_buf,
};

/// Flags a message as a data availability certificate.
pub const DAS_MESSAGE_HEADER_FLAG: u8 = 0x80;

/// Flags a certificate as using the tree merkelization strategy, which adds a
/// version field to the wire format. Ignored when the DAS flag is not set.
pub const TREE_DAS_MESSAGE_HEADER_FLAG: u8 = 0x08;

/// Flags a message as authenticated by L1. Round-trips through the codec but
/// carries no semantics.
pub const L1_AUTHENTICATED_MESSAGE_HEADER_FLAG: u8 = 0x40;

/// Flags a payload as zeroheavy-encoded.
pub const ZEROHEAVY_MESSAGE_HEADER_FLAG: u8 = 0x20;

/// The first payload byte of a brotli-compressed payload. Carried in the
/// payload, not in the certificate header.
pub const BROTLI_MESSAGE_HEADER_BYTE: u8 = 0;

/// Whether the header byte flags a data availability certificate.
pub const fn is_das_message_header_byte(header: u8) -> bool {
    header & DAS_MESSAGE_HEADER_FLAG != 0
}

/// Whether the header byte flags the tree merkelization strategy.
pub const fn is_tree_das_message_header_byte(header: u8) -> bool {
    header & TREE_DAS_MESSAGE_HEADER_FLAG != 0
}

/// Whether the header byte flags a zeroheavy-encoded payload.
pub const fn is_zeroheavy_encoded_header_byte(header: u8) -> bool {
    header & ZEROHEAVY_MESSAGE_HEADER_FLAG != 0
}

/// Whether the payload byte flags brotli compression.
pub const fn is_brotli_message_header_byte(byte: u8) -> bool {
    byte == BROTLI_MESSAGE_HEADER_BYTE
}

/// A data availability certificate.
///
/// Wire format, big-endian, no padding:
///
/// ```text
/// header_byte:1 | keysetHash:32 | dataHash:32 | timeout:8
/// [ version:1 if (header_byte & 0x08) ]
/// signersMask:8 | signature:96
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAvailabilityCertificate {
    /// The header byte the certificate was framed with. All flag bits are
    /// preserved so a parse/encode round trip is byte-identical.
    pub header_byte: u8,
    /// The content hash of the committee keyset.
    pub keyset_hash: B256,
    /// The hash identifying the stored payload.
    pub data_hash: B256,
    /// The expiry of the storage commitment, unix seconds.
    pub timeout: u64,
    /// Bit i set means committee key i participated in the aggregate.
    pub signers_mask: u64,
    /// The aggregate signature over the signable fields.
    pub signature: bls::Signature,
    /// The merkelization version. Only on the wire under the tree flag.
    pub version: u8,
}

impl DataAvailabilityCertificate {
    /// Tries to read a certificate from the input buffer, advancing it.
    pub fn try_from_buf(buf: &mut &[u8]) -> Result<Self, DasError> {
        check_buf_len!(buf, 1, DasError::Eof);
        let header_byte = from_be_bytes_slice_and_advance_buf!(u8, buf);
        if !is_das_message_header_byte(header_byte) {
            return Err(DasError::MissingDasHeader)
        }

        check_buf_len!(buf, 32 + 32 + 8, DasError::Eof);
        let keyset_hash = from_slice_and_advance_buf!(B256, buf);
        let data_hash = from_slice_and_advance_buf!(B256, buf);
        let timeout = from_be_bytes_slice_and_advance_buf!(u64, buf);

        let version = if is_tree_das_message_header_byte(header_byte) {
            check_buf_len!(buf, 1, DasError::Eof);
            from_be_bytes_slice_and_advance_buf!(u8, buf)
        } else {
            0
        };

        check_buf_len!(buf, 8 + bls::SIGNATURE_LENGTH, DasError::Eof);
        let signers_mask = from_be_bytes_slice_and_advance_buf!(u64, buf);
        let signature = bls::Signature::from_bytes(&buf[..bls::SIGNATURE_LENGTH])?;
        *buf = &buf[bls::SIGNATURE_LENGTH..];

        Ok(Self { header_byte, keyset_hash, data_hash, timeout, signers_mask, signature, version })
    }

    /// Decodes a certificate from the provided bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DasError> {
        Self::try_from_buf(&mut &*bytes)
    }

    /// Serializes the certificate into the provided buffer. Exact inverse of
    /// [`Self::try_from_buf`]: the version field is emitted only when the
    /// header byte carries the tree flag.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.header_byte);
        out.extend_from_slice(self.keyset_hash.as_slice());
        out.extend_from_slice(self.data_hash.as_slice());
        out.extend_from_slice(&self.timeout.to_be_bytes());
        if is_tree_das_message_header_byte(self.header_byte) {
            out.push(self.version);
        }
        out.extend_from_slice(&self.signers_mask.to_be_bytes());
        out.extend_from_slice(&self.signature.to_bytes());
    }

    /// Returns the serialization as a freshly allocated buffer.
    pub fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 32 + 32 + 8 + 1 + 8 + bls::SIGNATURE_LENGTH);
        self.encode(&mut out);
        out
    }

    /// The exact bytes committee signatures cover: the data hash, the
    /// big-endian timeout, and the version when non-zero.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 9);
        buf.extend_from_slice(self.data_hash.as_slice());
        buf.extend_from_slice(&self.timeout.to_be_bytes());
        if self.version != 0 {
            buf.push(self.version);
        }
        buf
    }

    /// Recovers the committee keyset referenced by the certificate.
    ///
    /// Fetches the keyset bytes by hash, rejects oversized blobs, verifies
    /// the content hash and deserializes.
    pub async fn recover_keyset<R>(&self, reader: &R) -> Result<Keyset, DasError>
    where
        R: DataAvailabilityReader + ?Sized,
    {
        let keyset_bytes = reader.get_by_hash(self.keyset_hash).await?;
        if keyset_bytes.len() > tree::BIN_SIZE {
            return Err(DasError::KeysetTooLarge)
        }
        if !tree::valid_hash(self.keyset_hash, &keyset_bytes) {
            return Err(DasError::HashMismatch)
        }
        Keyset::try_from_buf(&mut keyset_bytes.as_ref())
    }

    /// Verifies everything about the certificate except payload possession:
    /// keyset recovery, the honesty threshold, and the aggregate signature
    /// over [`Self::signable_bytes`].
    pub async fn verify_against<R>(&self, reader: &R) -> Result<(), DasError>
    where
        R: DataAvailabilityReader + ?Sized,
    {
        let keyset = self.recover_keyset(reader).await?;
        keyset.verify_signature(self.signers_mask, &self.signable_bytes(), &self.signature)
    }
}
