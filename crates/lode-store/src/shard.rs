use std::path::PathBuf;

/// Minimum key length eligible for sharding. Shorter keys map to themselves,
/// which avoids out-of-range slicing for degenerate identifiers.
pub const MIN_SHARD_KEY_LEN: usize = 5;

/// Map an identifier to its nested relative path.
///
/// Splits the key into `key[0..2] / key[2..4] / key[4..]`, two levels of
/// 2-character directories plus a leaf filename. For a hash-distributed key
/// space this bounds every directory to at most 256 entries, instead of a
/// flat directory with millions.
///
/// Pure and deterministic; performs no I/O. Keys are expected to be hex
/// digests — a non-ASCII key is treated like a short one and mapped to
/// itself rather than sliced at a non-character boundary.
pub fn shard_path(key: &str) -> PathBuf {
    if key.len() < MIN_SHARD_KEY_LEN || !key.is_ascii() {
        return PathBuf::from(key);
    }
    [&key[..2], &key[2..4], &key[4..]].iter().collect()
}
