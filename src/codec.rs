//! Multicodec + multibase key encoding.
//!
//! An encoded key is `'z'` followed by base58btc of `tag ++ raw`, where `tag`
//! is the two-byte varint multicodec for the key's algorithm and visibility:
//!
//! ```text
//! ed25519-pub   0xed 0x01      x25519-pub   0xec 0x01
//! ed25519-priv  0x80 0x26      x25519-priv  0x82 0x26
//! ```

use std::fmt;

use base58::{FromBase58, ToBase58};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Multibase prefix for base58btc.
pub const MULTIBASE_BASE58BTC: char = 'z';

/// Every supported key is 32 bytes.
pub const KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Ed25519,
    X25519,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

/// An (algorithm, visibility) pair with a fixed multicodec tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyKind {
    pub algorithm: Algorithm,
    pub visibility: Visibility,
}

impl KeyKind {
    pub const ED25519_PUBLIC: KeyKind = KeyKind::new(Algorithm::Ed25519, Visibility::Public);
    pub const ED25519_PRIVATE: KeyKind = KeyKind::new(Algorithm::Ed25519, Visibility::Private);
    pub const X25519_PUBLIC: KeyKind = KeyKind::new(Algorithm::X25519, Visibility::Public);
    pub const X25519_PRIVATE: KeyKind = KeyKind::new(Algorithm::X25519, Visibility::Private);

    pub const ALL: [KeyKind; 4] = [
        Self::ED25519_PUBLIC,
        Self::ED25519_PRIVATE,
        Self::X25519_PUBLIC,
        Self::X25519_PRIVATE,
    ];

    pub const fn new(algorithm: Algorithm, visibility: Visibility) -> Self {
        Self { algorithm, visibility }
    }

    pub const fn multicodec(self) -> [u8; 2] {
        match (self.algorithm, self.visibility) {
            (Algorithm::Ed25519, Visibility::Public) => [0xed, 0x01],
            (Algorithm::X25519, Visibility::Public) => [0xec, 0x01],
            (Algorithm::Ed25519, Visibility::Private) => [0x80, 0x26],
            (Algorithm::X25519, Visibility::Private) => [0x82, 0x26],
        }
    }

    pub fn from_multicodec(tag: [u8; 2]) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.multicodec() == tag)
    }

    pub const fn name(self) -> &'static str {
        match (self.algorithm, self.visibility) {
            (Algorithm::Ed25519, Visibility::Public) => "ed25519-pub",
            (Algorithm::X25519, Visibility::Public) => "x25519-pub",
            (Algorithm::Ed25519, Visibility::Private) => "ed25519-priv",
            (Algorithm::X25519, Visibility::Private) => "x25519-priv",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key in its self-describing text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedKey(String);

impl EncodedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EncodedKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EncodedKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode `raw` with the multicodec tag of `kind`.
pub fn encode(raw: &[u8; KEY_LEN], kind: KeyKind) -> EncodedKey {
    let mut tagged = Vec::with_capacity(2 + KEY_LEN);
    tagged.extend_from_slice(&kind.multicodec());
    tagged.extend_from_slice(raw);
    EncodedKey(format!("{MULTIBASE_BASE58BTC}{}", tagged.to_base58()))
}

/// Decode a key string back into its raw bytes and kind.
pub fn decode(text: &str) -> Result<([u8; KEY_LEN], KeyKind), DecodeError> {
    let body = text
        .strip_prefix(MULTIBASE_BASE58BTC)
        .ok_or(DecodeError::MissingMultibase)?;
    let bytes = body
        .from_base58()
        .map_err(|e| DecodeError::InvalidBase58(format!("{e:?}")))?;
    if bytes.len() < 2 {
        return Err(DecodeError::TooShort(bytes.len()));
    }
    let kind = KeyKind::from_multicodec([bytes[0], bytes[1]])
        .ok_or(DecodeError::UnknownMulticodec(bytes[0], bytes[1]))?;
    let raw: [u8; KEY_LEN] = bytes[2..]
        .try_into()
        .map_err(|_| DecodeError::InvalidLength {
            kind: kind.name(),
            expected: KEY_LEN,
            actual: bytes.len() - 2,
        })?;
    Ok((raw, kind))
}

/// Decode and require a specific kind.
pub fn decode_as(text: &str, expected: KeyKind) -> Result<[u8; KEY_LEN], DecodeError> {
    let (raw, kind) = decode(text)?;
    if kind != expected {
        return Err(DecodeError::UnexpectedKind {
            expected: expected.name(),
            found: kind.name(),
        });
    }
    Ok(raw)
}
