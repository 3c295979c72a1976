//! # Key Management
//!
//! The faucet signs with one Ed25519 key, loaded from config as hex. This
//! module turns those strings into a [`KeyMaterial`]: a 32-byte public key
//! and a 32-byte private seed.
//!
//! Some wallets export 64 bytes of private key material (seed followed by
//! public key). We keep only the first 32 bytes; the seed is the only thing
//! signing needs.
//!
//! Key bytes are never logged. `Debug` is redacted.

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use thiserror::Error;

use crate::config::{ADDRESS_LENGTH, PUBLIC_KEY_LENGTH, SEED_LENGTH};
use crate::identity::address::Address;

/// Errors that can occur while loading key material.
///
/// These say what shape was wrong, never what the bytes were.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 or 64 bytes, got {got}")]
    InvalidSecretKeyLength { got: usize },

    #[error("invalid public key: expected 32 bytes, got {got}")]
    InvalidPublicKeyLength { got: usize },

    #[error("key is not valid hex")]
    InvalidHex,

    #[error("public key does not match the one derived from the secret seed")]
    KeypairMismatch,
}

/// The faucet's signing key pair.
///
/// Intentionally not `Serialize`. Moving a seed around should be explicit.
#[derive(Clone)]
pub struct KeyMaterial {
    public_key: [u8; PUBLIC_KEY_LENGTH],
    seed: [u8; SEED_LENGTH],
}

impl KeyMaterial {
    /// Builds key material from raw bytes.
    ///
    /// `secret` may be 32 bytes (a bare seed) or 64 bytes (seed || public key);
    /// in the second case the tail is dropped.
    pub fn from_bytes(public_key: &[u8], secret: &[u8]) -> Result<Self, KeyError> {
        if public_key.len() != PUBLIC_KEY_LENGTH {
            return Err(KeyError::InvalidPublicKeyLength {
                got: public_key.len(),
            });
        }
        if secret.len() != SEED_LENGTH && secret.len() != 2 * SEED_LENGTH {
            return Err(KeyError::InvalidSecretKeyLength { got: secret.len() });
        }

        let mut pk = [0u8; PUBLIC_KEY_LENGTH];
        pk.copy_from_slice(public_key);
        let mut seed = [0u8; SEED_LENGTH];
        seed.copy_from_slice(&secret[..SEED_LENGTH]);

        Ok(Self {
            public_key: pk,
            seed,
        })
    }

    /// Builds key material from hex strings as they appear in config files.
    /// A leading `0x` is tolerated on either.
    pub fn from_hex(public_key_hex: &str, secret_hex: &str) -> Result<Self, KeyError> {
        let public_key = decode_hex(public_key_hex)?;
        let secret = decode_hex(secret_hex)?;
        Self::from_bytes(&public_key, &secret)
    }

    /// Builds key material from a seed alone, deriving the public key.
    pub fn from_seed(seed: [u8; SEED_LENGTH]) -> Self {
        let public_key = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        Self { public_key, seed }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    /// The 32-byte private seed. Handle with care.
    pub fn seed(&self) -> &[u8; SEED_LENGTH] {
        &self.seed
    }

    /// The address this key controls: the last 20 bytes of the public key.
    pub fn address(&self) -> Address {
        let start = PUBLIC_KEY_LENGTH - ADDRESS_LENGTH;
        let mut tail = [0u8; ADDRESS_LENGTH];
        tail.copy_from_slice(&self.public_key[start..]);
        Address::from_bytes(tail)
    }

    /// The Ed25519 verifying key derived from the seed.
    pub fn derived_verifying_key(&self) -> VerifyingKey {
        SigningKey::from_bytes(&self.seed).verifying_key()
    }

    /// Confirms the configured public key belongs to the configured seed.
    ///
    /// A mismatch means every transfer we sign will be rejected, so callers
    /// should check this once at startup.
    pub fn check_consistency(&self) -> Result<(), KeyError> {
        if self.derived_verifying_key().to_bytes() == self.public_key {
            Ok(())
        } else {
            Err(KeyError::KeypairMismatch)
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &hex::encode(self.public_key))
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, KeyError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).map_err(|_| KeyError::InvalidHex)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8032, section 7.1, test 1.
    const SEED_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const PUBLIC_HEX: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    #[test]
    fn loads_32_byte_seed() {
        let km = KeyMaterial::from_hex(PUBLIC_HEX, SEED_HEX).unwrap();
        assert_eq!(hex::encode(km.seed()), SEED_HEX);
        assert_eq!(hex::encode(km.public_key()), PUBLIC_HEX);
    }

    #[test]
    fn keeps_only_first_32_bytes_of_64_byte_secret() {
        let long = format!("{}{}", SEED_HEX, PUBLIC_HEX);
        let km = KeyMaterial::from_hex(PUBLIC_HEX, &long).unwrap();
        assert_eq!(hex::encode(km.seed()), SEED_HEX);
    }

    #[test]
    fn rejects_odd_secret_lengths() {
        let err = KeyMaterial::from_bytes(&[0u8; 32], &[0u8; 48]).unwrap_err();
        assert!(matches!(err, KeyError::InvalidSecretKeyLength { got: 48 }));
    }

    #[test]
    fn rejects_short_public_key() {
        let err = KeyMaterial::from_bytes(&[0u8; 20], &[0u8; 32]).unwrap_err();
        assert!(matches!(err, KeyError::InvalidPublicKeyLength { got: 20 }));
    }

    #[test]
    fn rejects_non_hex() {
        assert!(matches!(
            KeyMaterial::from_hex("not hex", SEED_HEX),
            Err(KeyError::InvalidHex)
        ));
    }

    #[test]
    fn tolerates_0x_prefix() {
        let km = KeyMaterial::from_hex(&format!("0x{}", PUBLIC_HEX), SEED_HEX).unwrap();
        assert_eq!(hex::encode(km.public_key()), PUBLIC_HEX);
    }

    #[test]
    fn address_is_last_20_bytes_of_public_key() {
        let km = KeyMaterial::from_hex(PUBLIC_HEX, SEED_HEX).unwrap();
        assert_eq!(
            km.address().to_string(),
            "0xc964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn consistent_pair_passes_check() {
        let km = KeyMaterial::from_hex(PUBLIC_HEX, SEED_HEX).unwrap();
        km.check_consistency().unwrap();
        assert_eq!(km.derived_verifying_key().to_bytes(), *km.public_key());
    }

    #[test]
    fn mismatched_pair_fails_check() {
        let km = KeyMaterial::from_bytes(&[7u8; 32], &[1u8; 32]).unwrap();
        assert!(matches!(
            km.check_consistency(),
            Err(KeyError::KeypairMismatch)
        ));
    }

    #[test]
    fn from_seed_derives_matching_public_key() {
        let km = KeyMaterial::from_seed([42u8; 32]);
        km.check_consistency().unwrap();
    }

    #[test]
    fn debug_never_prints_seed() {
        let km = KeyMaterial::from_hex(PUBLIC_HEX, SEED_HEX).unwrap();
        let rendered = format!("{:?}", km);
        assert!(!rendered.contains(SEED_HEX));
        assert!(rendered.contains("[REDACTED]"));
    }
}
