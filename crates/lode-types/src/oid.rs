use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Hex length of an [`Oid`]: a SHA-256 digest is 32 bytes, 64 hex characters.
pub const OID_HEX_LEN: usize = 64;

/// Content-addressed identifier for a stored object.
///
/// An `Oid` is the lowercase-hex SHA-256 digest of an object's decompressed
/// bytes. Identical content always produces the same `Oid`, making objects
/// deduplicatable and verifiable. Identifiers arrive from the transfer layer
/// as strings, so construction (and deserialization) validates the length
/// and character set rather than trusting the caller.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

impl Oid {
    /// Validate and wrap a lowercase-hex identifier string.
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if s.len() != OID_HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: OID_HEX_LEN,
                actual: s.len(),
            });
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(TypeError::InvalidHex(s));
        }
        Ok(Self(s))
    }

    /// Compute the `Oid` of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// The identifier as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 hex characters), for logs and debug output.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    /// Consume the identifier, yielding the owned hex string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-256 accumulator producing an [`Oid`].
///
/// Used by the write path to digest content while it streams through the
/// compressor, without buffering the object in memory.
#[derive(Default)]
pub struct OidHasher {
    inner: Sha256,
}

impl OidHasher {
    /// Create a fresh accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of content into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish the digest and yield the resulting identifier.
    pub fn finalize(self) -> Oid {
        Oid(hex::encode(self.inner.finalize()))
    }
}
