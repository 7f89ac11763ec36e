use serde::{Deserialize, Serialize};

use crate::oid::Oid;

/// Caller-supplied expectations for a stored object.
///
/// A descriptor pairs the identifier an object must hash to with the byte
/// length its decompressed content must have. The store verifies both before
/// an object becomes visible; a descriptor never describes in-flight or
/// unverified data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    /// Expected identifier: digest of the decompressed content.
    pub oid: Oid,
    /// Expected decompressed content length in bytes.
    pub size: u64,
}

impl ContentDescriptor {
    /// Create a descriptor from an identifier and expected size.
    pub fn new(oid: Oid, size: u64) -> Self {
        Self { oid, size }
    }

    /// Compute the descriptor that describes `data` exactly.
    pub fn for_bytes(data: &[u8]) -> Self {
        Self {
            oid: Oid::from_bytes(data),
            size: data.len() as u64,
        }
    }
}
