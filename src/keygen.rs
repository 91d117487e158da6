//! Key material generation.
//!
//! An agent owns one Ed25519 signing keypair and one X25519 key-agreement
//! keypair. The X25519 secret is derived from the Ed25519 seed with the
//! standard conversion (lower half of `SHA-512(seed)`, clamped), so a given
//! signing key always yields the same encryption key.

use std::fmt;

use ed25519_dalek::SigningKey;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::codec::{self, EncodedKey, KEY_LEN, KeyKind};
use crate::error::DecodeError;

#[derive(Debug, Error)]
pub enum KeyMaterialError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{0} public key does not match its private key")]
    Mismatch(&'static str),
}

/// Public/private halves of one algorithm, in encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedPair {
    pub public: EncodedKey,
    pub private: EncodedKey,
}

/// Raw bytes behind the four encoded keys.
#[derive(Clone, PartialEq, Eq)]
pub struct RawKeys {
    pub ed25519_public: [u8; KEY_LEN],
    pub ed25519_private: [u8; KEY_LEN],
    pub x25519_public: [u8; KEY_LEN],
    pub x25519_private: [u8; KEY_LEN],
}

/// All four keys of an agent, kept together.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub ed25519: EncodedPair,
    pub x25519: EncodedPair,
    raw: RawKeys,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("ed25519_public", &self.ed25519.public)
            .field("x25519_public", &self.x25519.public)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    fn from_raw(raw: RawKeys) -> Self {
        Self {
            ed25519: EncodedPair {
                public: codec::encode(&raw.ed25519_public, KeyKind::ED25519_PUBLIC),
                private: codec::encode(&raw.ed25519_private, KeyKind::ED25519_PRIVATE),
            },
            x25519: EncodedPair {
                public: codec::encode(&raw.x25519_public, KeyKind::X25519_PUBLIC),
                private: codec::encode(&raw.x25519_private, KeyKind::X25519_PRIVATE),
            },
            raw,
        }
    }

    /// Rebuild key material from its persisted encoded form.
    ///
    /// Each public key must match the one computed from its private key. The
    /// X25519 pair is not required to be derived from the Ed25519 seed, so
    /// records holding independently generated pairs still load.
    pub fn from_encoded(ed25519: EncodedPair, x25519: EncodedPair) -> Result<Self, KeyMaterialError> {
        let ed25519_public = codec::decode_as(ed25519.public.as_str(), KeyKind::ED25519_PUBLIC)?;
        let ed25519_private = codec::decode_as(ed25519.private.as_str(), KeyKind::ED25519_PRIVATE)?;
        let x25519_public = codec::decode_as(x25519.public.as_str(), KeyKind::X25519_PUBLIC)?;
        let x25519_private = codec::decode_as(x25519.private.as_str(), KeyKind::X25519_PRIVATE)?;

        if SigningKey::from_bytes(&ed25519_private).verifying_key().to_bytes() != ed25519_public {
            return Err(KeyMaterialError::Mismatch("ed25519"));
        }
        if PublicKey::from(&StaticSecret::from(x25519_private)).to_bytes() != x25519_public {
            return Err(KeyMaterialError::Mismatch("x25519"));
        }

        Ok(Self {
            ed25519,
            x25519,
            raw: RawKeys { ed25519_public, ed25519_private, x25519_public, x25519_private },
        })
    }

    pub fn raw(&self) -> &RawKeys {
        &self.raw
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.raw.ed25519_private)
    }
}

/// Generate fresh key material from the OS random source.
pub fn generate() -> KeyMaterial {
    from_signing_key(&SigningKey::generate(&mut OsRng))
}

/// Build key material around an existing signing key.
pub fn from_signing_key(signing_key: &SigningKey) -> KeyMaterial {
    let seed = signing_key.to_bytes();
    let (x25519_private, x25519_public) = x25519_from_ed25519_seed(&seed);
    KeyMaterial::from_raw(RawKeys {
        ed25519_public: signing_key.verifying_key().to_bytes(),
        ed25519_private: seed,
        x25519_public,
        x25519_private,
    })
}

/// Ed25519 seed → `(x25519_secret, x25519_public)`.
pub fn x25519_from_ed25519_seed(seed: &[u8; KEY_LEN]) -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
    let digest = Sha512::digest(seed);
    let mut secret = [0u8; KEY_LEN];
    secret.copy_from_slice(&digest[..KEY_LEN]);
    secret[0] &= 248;
    secret[31] &= 127;
    secret[31] |= 64;
    let public = PublicKey::from(&StaticSecret::from(secret)).to_bytes();
    (secret, public)
}
