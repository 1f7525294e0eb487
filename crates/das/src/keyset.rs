use crate::{
    bls::{self, PublicKey, Signature},
    tree, DasError,
};

use alloy_primitives::B256;

/// The maximum number of committee members. Bounded so the signers bitmap
/// fits a u64.
pub const MAX_KEYSET_SIZE: u64 = 64;

/// An ordered committee of BLS public keys plus its honesty threshold,
/// content-addressed by the tree hash of its serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyset {
    /// The minimum number of honest committee members assumed by the chain.
    pub assumed_honest: u64,
    /// The committee public keys, in mask-bit order.
    pub pub_keys: Vec<PublicKey>,
}

impl Keyset {
    /// Serializes the keyset into the provided buffer.
    pub fn encode(&self, out: &mut Vec<u8>) {
        write_uleb128(self.assumed_honest, out);
        write_uleb128(self.pub_keys.len() as u64, out);
        for key in &self.pub_keys {
            let bytes = key.to_bytes();
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(&bytes);
        }
    }

    /// Returns the serialization as a freshly allocated buffer.
    pub fn encoded(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Deserializes a keyset, consuming the buffer.
    pub fn try_from_buf(buf: &mut &[u8]) -> Result<Self, DasError> {
        let assumed_honest = read_uleb128(buf)?;
        let num_keys = read_uleb128(buf)?;
        if num_keys > MAX_KEYSET_SIZE {
            return Err(DasError::TooManyKeys(num_keys))
        }

        let mut pub_keys = Vec::with_capacity(num_keys as usize);
        for _ in 0..num_keys {
            if buf.len() < 2 {
                return Err(DasError::Eof)
            }
            let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
            if buf.len() < 2 + len {
                return Err(DasError::Eof)
            }
            pub_keys.push(PublicKey::from_bytes(&buf[2..2 + len])?);
            *buf = &buf[2 + len..];
        }

        Ok(Self { assumed_honest, pub_keys })
    }

    /// Computes the content hash of the keyset. Errors if the serialization
    /// exceeds a single tree bin.
    pub fn hash(&self) -> Result<B256, DasError> {
        let encoded = self.encoded();
        if encoded.len() > tree::BIN_SIZE {
            return Err(DasError::KeysetTooLarge)
        }
        Ok(tree::hash(&encoded))
    }

    /// Verifies an aggregate signature over `data` from the committee members
    /// selected by `signers_mask` (bit i set means key i participated).
    ///
    /// Fails with [`DasError::NotEnoughSigners`] before any curve operation
    /// when the non-signers reach the honesty threshold.
    pub fn verify_signature(
        &self,
        signers_mask: u64,
        data: &[u8],
        sig: &Signature,
    ) -> Result<(), DasError> {
        let mut signers = Vec::new();
        let mut non_signers = 0u64;
        for (i, key) in self.pub_keys.iter().enumerate() {
            if (1u64 << i) & signers_mask != 0 {
                signers.push(key);
            } else {
                non_signers += 1;
            }
        }
        if non_signers >= self.assumed_honest {
            return Err(DasError::NotEnoughSigners {
                non_signers,
                assumed_honest: self.assumed_honest,
            })
        }

        let aggregated = bls::aggregate_public_keys(signers);
        if !bls::verify_signature(sig, data, &aggregated) {
            return Err(DasError::BadSignature)
        }
        Ok(())
    }
}

fn write_uleb128(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_uleb128(buf: &mut &[u8]) -> Result<u64, DasError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *buf.first().ok_or(DasError::Eof)?;
        *buf = &buf[1..];
        if shift == 63 && byte > 1 {
            return Err(DasError::InvalidInteger)
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(DasError::InvalidInteger)
        }
    }
}
