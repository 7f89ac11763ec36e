//! Content-addressed blob storage for Lode.
//!
//! This crate is the storage backend behind Lode's transfer layer: it
//! persists arbitrary byte streams on the local file system keyed by the
//! SHA-256 digest of their decompressed contents, and retrieves them with
//! transparent decompression and resumable offsets. The HTTP surface,
//! authentication, and metadata database live elsewhere and call in through
//! the [`ContentStore`] trait.
//!
//! # On-Disk Layout
//!
//! Objects are gzip-compressed and sharded two directory levels deep to
//! bound per-directory fan-out (relative to the store root):
//!
//! ```text
//! ab/cd/ef1234…cdef.gz        # published, verified object
//! ab/cd/ef1234…cdef.gz.tmp    # in-flight write, never valid content
//! ```
//!
//! # Storage Backends
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - [`FilesystemContentStore`] — durable sharded file-system store
//! - [`InMemoryContentStore`] — `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. An object at its published path always matches its descriptor; the
//!    atomic rename of the verified temp file is the sole publish point.
//! 2. Objects are immutable once published and never mutated in place.
//! 3. The store holds no in-memory index — the file-system namespace is the
//!    authoritative index, so concurrent processes may share a root.
//! 4. Every failure is returned to the caller as a typed [`StoreError`];
//!    the only best-effort behavior is temp-file cleanup after a failed
//!    write, which never fails the operation itself.
//! 5. The store is silent: diagnostics are `tracing` events, emitted only
//!    when the embedding process installs a subscriber.

pub mod error;
pub mod fs;
pub mod memory;
pub mod reader;
pub mod shard;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FilesystemContentStore;
pub use memory::InMemoryContentStore;
pub use reader::ObjectReader;
pub use shard::{shard_path, MIN_SHARD_KEY_LEN};
pub use traits::ContentStore;
