use lode_types::Oid;

/// Errors from content store operations.
///
/// Integrity failures (`SizeMismatch`, `HashMismatch`) mean the uploaded
/// bytes disagree with their descriptor and a retry needs fresh input;
/// `Io` and `CorruptObject` point at the storage itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object is not present in the store.
    #[error("object not found: {0}")]
    NotFound(Oid),

    /// Content size does not match the descriptor; the object was discarded.
    #[error("content size does not match for {oid}: expected {expected} bytes, got {actual}")]
    SizeMismatch { oid: Oid, expected: u64, actual: u64 },

    /// Content hash does not match the descriptor's identifier; the object
    /// was discarded.
    #[error("content hash does not match: expected {expected}, computed {computed}")]
    HashMismatch { expected: Oid, computed: Oid },

    /// Another write for the same identifier holds the temp file. Transient;
    /// the caller may retry once the racing writer finishes.
    #[error("write already in progress for {0}")]
    WriteInProgress(Oid),

    /// The stored bytes are not a valid compressed object (external
    /// corruption, or a foreign file at the object path).
    #[error("corrupt object {oid}: {reason}")]
    CorruptObject { oid: Oid, reason: String },

    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
