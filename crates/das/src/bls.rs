//! Minimal-pubkey-size BLS signatures over BLS12-381.
//!
//! Public keys are compressed G1 points (48 bytes), signatures compressed G2
//! points (96 bytes). Messages are hashed to G2 with `XMD:SHA-256`.

use crate::DasError;

use bls12_381::{
    hash_to_curve::{ExpandMsgXmd, HashToCurve},
    pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar,
};
use rand::RngCore;
use sha2::Sha256;

/// The domain separation tag for committee signatures.
pub const SIGNATURE_DOMAIN: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_DAS_COMMITTEE_";

/// The length of a compressed public key in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 48;

/// The length of a compressed signature in bytes.
pub const SIGNATURE_LENGTH: usize = 96;

/// A BLS public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(G1Affine);

impl PublicKey {
    /// Returns the compressed encoding of the key.
    pub fn to_bytes(self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.0.to_compressed()
    }

    /// Decodes a key from its compressed encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DasError> {
        let arr: [u8; PUBLIC_KEY_LENGTH] =
            bytes.try_into().map_err(|_| DasError::InvalidPublicKey)?;
        Option::from(G1Affine::from_compressed(&arr))
            .map(Self)
            .ok_or(DasError::InvalidPublicKey)
    }
}

/// A BLS signature, possibly an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(G2Affine);

impl Signature {
    /// Returns the compressed encoding of the signature.
    pub fn to_bytes(self) -> [u8; SIGNATURE_LENGTH] {
        self.0.to_compressed()
    }

    /// Decodes a signature from its compressed encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DasError> {
        let arr: [u8; SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| DasError::InvalidSignatureEncoding)?;
        Option::from(G2Affine::from_compressed(&arr))
            .map(Self)
            .ok_or(DasError::InvalidSignatureEncoding)
    }
}

/// A BLS secret key.
#[derive(Debug, Clone)]
pub struct SecretKey(Scalar);

impl SecretKey {
    /// Samples a fresh secret key from the provided randomness source.
    pub fn random(mut rng: impl RngCore) -> Self {
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        Self(Scalar::from_bytes_wide(&wide))
    }

    /// Returns the public key of this secret key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(G1Affine::from(G1Projective::generator() * self.0))
    }

    /// Signs the provided message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(G2Affine::from(hash_to_g2(message) * self.0))
    }
}

/// Aggregates the provided public keys by point addition.
pub fn aggregate_public_keys<'a>(keys: impl IntoIterator<Item = &'a PublicKey>) -> PublicKey {
    let sum = keys.into_iter().fold(G1Projective::identity(), |acc, key| acc + key.0);
    PublicKey(G1Affine::from(sum))
}

/// Aggregates the provided signatures by point addition.
pub fn aggregate_signatures<'a>(sigs: impl IntoIterator<Item = &'a Signature>) -> Signature {
    let sum = sigs.into_iter().fold(G2Projective::identity(), |acc, sig| acc + sig.0);
    Signature(G2Affine::from(sum))
}

/// Verifies a signature (or aggregate) against a public key (or aggregate).
pub fn verify_signature(sig: &Signature, message: &[u8], public_key: &PublicKey) -> bool {
    pairing(&public_key.0, &G2Affine::from(hash_to_g2(message))) ==
        pairing(&G1Affine::generator(), &sig.0)
}

fn hash_to_g2(message: &[u8]) -> G2Projective {
    <G2Projective as HashToCurve<ExpandMsgXmd<Sha256>>>::hash_to_curve(message, SIGNATURE_DOMAIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_should_verify_aggregate_signature() {
        let mut rng = StdRng::seed_from_u64(1);
        let keys: Vec<_> = (0..3).map(|_| SecretKey::random(&mut rng)).collect();
        let message = b"attested payload";

        let sigs: Vec<_> = keys.iter().map(|k| k.sign(message)).collect();
        let agg_sig = aggregate_signatures(&sigs);
        let pub_keys: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
        let agg_key = aggregate_public_keys(&pub_keys);

        assert!(verify_signature(&agg_sig, message, &agg_key));
        assert!(!verify_signature(&agg_sig, b"other payload", &agg_key));
    }

    #[test]
    fn test_should_roundtrip_key_and_signature_encodings() {
        let mut rng = StdRng::seed_from_u64(2);
        let key = SecretKey::random(&mut rng);
        let sig = key.sign(b"msg");

        let pk = key.public_key();
        assert_eq!(PublicKey::from_bytes(&pk.to_bytes()).unwrap(), pk);
        assert_eq!(Signature::from_bytes(&sig.to_bytes()).unwrap(), sig);
    }
}
