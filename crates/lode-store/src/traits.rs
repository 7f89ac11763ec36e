use std::io::Read;

use lode_types::ContentDescriptor;

use crate::error::StoreResult;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - An object visible under a descriptor always has the descriptor's
///   decompressed size and hashes to its identifier; no unverified object
///   is ever observable.
/// - Objects are immutable once stored; `put` never mutates in place.
/// - Concurrent reads are always safe. Concurrent writes for the same
///   identifier fail fast rather than block or merge; writes for different
///   identifiers never interfere.
/// - Every operation is a sequence of blocking calls; there is no internal
///   scheduler, and cancellation is the caller's concern (close the source
///   out-of-band and tolerate the resulting I/O error).
pub trait ContentStore: Send + Sync {
    /// Stream `source` into the store under the descriptor's identifier.
    ///
    /// The content is digested and counted while it streams; the object
    /// becomes visible only if both the size and the hash match the
    /// descriptor. On any failure nothing is published.
    fn put(&self, desc: &ContentDescriptor, source: &mut dyn Read) -> StoreResult<()>;

    /// Open a stream of the object's decompressed bytes, starting at
    /// `from_byte` (pass 0 for the whole object; used to resume transfers).
    ///
    /// An offset past the end of the object is an
    /// [`UnexpectedEof`](std::io::ErrorKind::UnexpectedEof) error, never a
    /// silently shortened stream. The returned handle releases its
    /// underlying resources on drop.
    fn get(&self, desc: &ContentDescriptor, from_byte: u64) -> StoreResult<Box<dyn Read + Send>>;

    /// Cheap presence check: `true` if an object is stored under the
    /// descriptor's identifier. Performs no integrity verification.
    fn exists(&self, desc: &ContentDescriptor) -> bool;
}
