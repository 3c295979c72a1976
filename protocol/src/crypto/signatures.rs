//! # Transfer Signatures
//!
//! The ledger uses an Ed25519 variant whose challenge hash covers only the
//! nonce point and the message: `k = H(R || M)`. Plain RFC 8032 hashes
//! `R || A || M`, so an off-the-shelf Ed25519 signer produces signatures
//! the node rejects. Dropping `A` from the challenge is what lets the node
//! recover the signer's public key from the signature itself.
//!
//! Everything else is stock Ed25519: SHA-512 over the seed, the standard
//! clamping of the lower half, a deterministic nonce from the upper half.
//! We build it from `curve25519-dalek` primitives rather than rolling any
//! field or group arithmetic ourselves.
//!
//! ## Procedure
//!
//! ```text
//! h        = SHA512(seed)
//! a        = clamp(h[0..32])
//! r        = SHA512(h[32..64] || M) mod L
//! R        = r·B
//! S        = (r + SHA512(R || M)·a) mod L
//! sig      = R || S
//! ```
//!
//! Verification checks `S·B == R + SHA512(R || M)·A`.

use std::fmt;

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::{clamp_integer, Scalar};
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::config::{PUBLIC_KEY_LENGTH, SEED_LENGTH, SIGNATURE_LENGTH};

/// Errors during signature verification.
///
/// Deliberately coarse. "It didn't verify" is all a caller needs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected {SIGNATURE_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 64-byte signature: compressed `R` followed by the scalar `S`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TransactionSignature([u8; SIGNATURE_LENGTH]);

impl TransactionSignature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; SIGNATURE_LENGTH] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn split(&self) -> ([u8; 32], [u8; 32]) {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&self.0[..32]);
        s.copy_from_slice(&self.0[32..]);
        (r, s)
    }
}

impl fmt::Debug for TransactionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionSignature({})", self.to_hex())
    }
}

/// SHA-512 over the concatenated parts, read little-endian and reduced mod L.
fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    wide.copy_from_slice(hasher.finalize().as_slice());
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Signs `message` with the 32-byte private seed.
///
/// Pure and deterministic: the same seed and message always give the same
/// 64 bytes. Nothing besides the seed is kept between calls.
pub fn sign(seed: &[u8; SEED_LENGTH], message: &[u8]) -> TransactionSignature {
    let mut h = [0u8; 64];
    h.copy_from_slice(Sha512::digest(seed).as_slice());

    let mut a_bytes = [0u8; 32];
    a_bytes.copy_from_slice(&h[..32]);
    let a = Scalar::from_bytes_mod_order(clamp_integer(a_bytes));
    let prefix = &h[32..];

    let r = hash_to_scalar(&[prefix, message]);
    let r_bytes = EdwardsPoint::mul_base(&r).compress().to_bytes();

    let k = hash_to_scalar(&[r_bytes.as_slice(), message]);
    let s = r + k * a;

    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..32].copy_from_slice(&r_bytes);
    out[32..].copy_from_slice(s.as_bytes());
    TransactionSignature(out)
}

/// Verifies a signature against a 32-byte public key.
///
/// Rejects non-canonical `S` values, so a signature can't be malleated by
/// adding multiples of L.
pub fn verify(
    public_key: &[u8; PUBLIC_KEY_LENGTH],
    message: &[u8],
    signature: &TransactionSignature,
) -> Result<(), SignatureError> {
    let a = CompressedEdwardsY(*public_key)
        .decompress()
        .ok_or(SignatureError::InvalidPublicKey)?;

    let (r_bytes, s_bytes) = signature.split();
    let s: Scalar = Option::from(Scalar::from_canonical_bytes(s_bytes))
        .ok_or(SignatureError::VerificationFailed)?;
    let k = hash_to_scalar(&[r_bytes.as_slice(), message]);

    // R' = S·B - k·A must compress to the R we were given.
    let expected = EdwardsPoint::vartime_double_scalar_mul_basepoint(&(-k), &a, &s);
    if expected.compress().to_bytes() == r_bytes {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}

/// Recovers the signer's public key from a message and its signature:
/// `A = (S·B - R) · k⁻¹`.
///
/// The recovered key is only meaningful if the signature is genuine; check
/// it against an expected key or run [`verify`] with it.
pub fn extract_public_key(
    message: &[u8],
    signature: &TransactionSignature,
) -> Result<[u8; PUBLIC_KEY_LENGTH], SignatureError> {
    let (r_bytes, s_bytes) = signature.split();
    let r = CompressedEdwardsY(r_bytes)
        .decompress()
        .ok_or(SignatureError::VerificationFailed)?;
    let s: Scalar = Option::from(Scalar::from_canonical_bytes(s_bytes))
        .ok_or(SignatureError::VerificationFailed)?;
    let k = hash_to_scalar(&[r_bytes.as_slice(), message]);
    if k == Scalar::ZERO {
        return Err(SignatureError::VerificationFailed);
    }

    let a = (EdwardsPoint::mul_base(&s) - r) * k.invert();
    Ok(a.compress().to_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyMaterial;
    use ed25519_dalek::{Signer, SigningKey};

    fn key(seed_byte: u8) -> KeyMaterial {
        KeyMaterial::from_seed([seed_byte; 32])
    }

    #[test]
    fn sign_and_verify() {
        let km = key(1);
        let msg = b"send 100 smidge";
        let sig = sign(km.seed(), msg);
        verify(km.public_key(), msg, &sig).unwrap();
    }

    #[test]
    fn signing_is_deterministic() {
        let km = key(2);
        let msg = [0x5au8; 52];
        assert_eq!(sign(km.seed(), &msg), sign(km.seed(), &msg));
    }

    #[test]
    fn different_messages_give_different_signatures() {
        let km = key(3);
        assert_ne!(sign(km.seed(), b"a"), sign(km.seed(), b"b"));
    }

    #[test]
    fn wrong_message_fails() {
        let km = key(4);
        let sig = sign(km.seed(), b"correct");
        assert_eq!(
            verify(km.public_key(), b"wrong", &sig),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn wrong_key_fails() {
        let sig = sign(key(5).seed(), b"msg");
        assert_eq!(
            verify(key(6).public_key(), b"msg", &sig),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn tampered_signature_fails() {
        let km = key(7);
        let sig = sign(km.seed(), b"msg");
        let mut bytes = *sig.as_bytes();
        bytes[10] ^= 0x01;
        assert!(verify(km.public_key(), b"msg", &TransactionSignature::from_bytes(bytes)).is_err());
    }

    #[test]
    fn non_canonical_s_is_rejected() {
        let km = key(8);
        let sig = sign(km.seed(), b"msg");
        let mut bytes = *sig.as_bytes();
        bytes[63] |= 0xf0;
        assert_eq!(
            verify(km.public_key(), b"msg", &TransactionSignature::from_bytes(bytes)),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn nonce_point_matches_rfc8032() {
        // Only the challenge differs from RFC 8032, so R must be identical.
        let km = key(9);
        let msg = b"same nonce derivation";
        let ours = sign(km.seed(), msg);
        let stock = SigningKey::from_bytes(km.seed()).sign(msg).to_bytes();
        assert_eq!(ours.as_bytes()[..32], stock[..32]);
        assert_ne!(ours.as_bytes()[32..], stock[32..]);
    }

    #[test]
    fn public_key_is_recoverable() {
        let km = key(10);
        let msg = b"who signed this?";
        let sig = sign(km.seed(), msg);
        assert_eq!(extract_public_key(msg, &sig).unwrap(), *km.public_key());
    }

    #[test]
    fn from_slice_checks_length() {
        assert_eq!(
            TransactionSignature::from_slice(&[0u8; 63]),
            Err(SignatureError::InvalidLength(63))
        );
        assert!(TransactionSignature::from_slice(&[0u8; 64]).is_ok());
    }

    #[test]
    fn random_seeds_roundtrip() {
        for _ in 0..16 {
            let seed: [u8; 32] = rand::random();
            let km = KeyMaterial::from_seed(seed);
            let msg: [u8; 52] = std::array::from_fn(|i| seed[i % 32] ^ i as u8);
            let sig = sign(km.seed(), &msg);
            verify(km.public_key(), &msg, &sig).unwrap();
        }
    }
}
