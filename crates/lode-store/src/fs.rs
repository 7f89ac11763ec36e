use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use lode_types::{ContentDescriptor, Oid, OidHasher};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::reader::ObjectReader;
use crate::shard::shard_path;
use crate::traits::ContentStore;

/// Suffix of a published object file.
const OBJECT_SUFFIX: &str = ".gz";
/// Transient suffix of an in-flight write; never valid content.
const TMP_SUFFIX: &str = ".tmp";
/// Read buffer for streaming a source through the digest and the encoder.
const COPY_BUF_LEN: usize = 64 * 1024;

/// Durable, sharded file-system content store.
///
/// The store's only state is its root directory; the file-system namespace
/// underneath is the authoritative index, so any number of threads or
/// processes may operate on the same root concurrently. Writers publish
/// through verify-then-rename, readers open published paths directly, and
/// the rename's atomicity is the sole synchronization point between them.
///
/// Writer races on the same identifier resolve by exclusive temp-file
/// creation: the last verified writer wins and the racing writer observes
/// [`StoreError::WriteInProgress`] immediately.
#[derive(Debug)]
pub struct FilesystemContentStore {
    root: PathBuf,
}

impl FilesystemContentStore {
    /// Open a store rooted at `root`, creating the directory (recursively,
    /// owner-restricted) if it does not exist. Idempotent.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        create_dir_restricted(&root)?;
        debug!(root = %root.display(), "content store ready");
        Ok(Self { root })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path an object with this identifier is published at.
    fn object_path(&self, oid: &Oid) -> PathBuf {
        with_suffix(&self.root.join(shard_path(oid.as_str())), OBJECT_SUFFIX)
    }
}

impl ContentStore for FilesystemContentStore {
    fn put(&self, desc: &ContentDescriptor, source: &mut dyn Read) -> StoreResult<()> {
        let object_path = self.object_path(&desc.oid);
        let tmp_path = with_suffix(&object_path, TMP_SUFFIX);

        if let Some(parent) = object_path.parent() {
            create_dir_restricted(parent)?;
        }

        let tmp = open_tmp_exclusive(&tmp_path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StoreError::WriteInProgress(desc.oid.clone()),
            _ => StoreError::Io(e),
        })?;
        // Removes the temp path on every exit from here on. After a
        // successful rename it targets a path that no longer exists and the
        // failure is ignored.
        let _guard = TempGuard::new(&tmp_path);

        let mut encoder = GzEncoder::new(tmp, Compression::best());
        let mut hasher = OidHasher::new();
        let mut received: u64 = 0;
        let mut buf = vec![0u8; COPY_BUF_LEN];
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
            encoder.write_all(&buf[..n])?;
            received += n as u64;
        }
        let tmp = encoder.finish()?;
        // Make the verified bytes durable before the rename publishes them,
        // so a power loss cannot expose a truncated object at the final path.
        tmp.sync_all()?;
        drop(tmp);

        if received != desc.size {
            debug!(
                oid = %desc.oid.short(),
                expected = desc.size,
                actual = received,
                "rejected object: size mismatch"
            );
            return Err(StoreError::SizeMismatch {
                oid: desc.oid.clone(),
                expected: desc.size,
                actual: received,
            });
        }

        let computed = hasher.finalize();
        if computed != desc.oid {
            debug!(
                expected = %desc.oid.short(),
                computed = %computed.short(),
                "rejected object: hash mismatch"
            );
            return Err(StoreError::HashMismatch {
                expected: desc.oid.clone(),
                computed,
            });
        }

        fs::rename(&tmp_path, &object_path)?;
        debug!(oid = %desc.oid.short(), size = received, "object published");
        Ok(())
    }

    fn get(&self, desc: &ContentDescriptor, from_byte: u64) -> StoreResult<Box<dyn Read + Send>> {
        let path = self.object_path(&desc.oid);
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(desc.oid.clone()),
            _ => StoreError::Io(e),
        })?;
        Ok(Box::new(ObjectReader::open(&desc.oid, file, from_byte)?))
    }

    fn exists(&self, desc: &ContentDescriptor) -> bool {
        match fs::metadata(self.object_path(&desc.oid)) {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(
                    oid = %desc.oid.short(),
                    error = %e,
                    "treating unreadable object as absent"
                );
                false
            }
        }
    }
}

/// Append a suffix to a path without touching its extension handling.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Recursively create a directory with owner-only permissions on Unix.
fn create_dir_restricted(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

/// Exclusively create the temp file for an in-flight write. An
/// `AlreadyExists` failure means another writer holds the same identifier.
fn open_tmp_exclusive(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}

/// Best-effort removal of the temp path on drop. Cleanup failures never
/// fail the surrounding operation.
struct TempGuard {
    path: PathBuf,
}

impl TempGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_store() -> (tempfile::TempDir, FilesystemContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemContentStore::new(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    fn put_bytes(store: &FilesystemContentStore, content: &[u8]) -> ContentDescriptor {
        let desc = ContentDescriptor::for_bytes(content);
        store.put(&desc, &mut &content[..]).unwrap();
        desc
    }

    fn read_all(store: &FilesystemContentStore, desc: &ContentDescriptor, from: u64) -> Vec<u8> {
        let mut out = Vec::new();
        store
            .get(desc, from)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    /// Mirror of the store's path derivation, asserted against in the
    /// layout tests below.
    fn object_path_of(store: &FilesystemContentStore, oid: &Oid) -> PathBuf {
        with_suffix(&store.root().join(shard_path(oid.as_str())), ".gz")
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    #[test]
    fn new_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a").join("b").join("objects");
        let store = FilesystemContentStore::new(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn new_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("objects");
        FilesystemContentStore::new(&root).unwrap();
        FilesystemContentStore::new(&root).unwrap();
    }

    #[test]
    fn new_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("squatter");
        fs::write(&root, b"not a directory").unwrap();
        let err = FilesystemContentStore::new(&root).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    // -----------------------------------------------------------------------
    // Round-trip
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get_roundtrip() {
        let (_dir, store) = new_store();
        let desc = put_bytes(&store, b"hello world");
        assert_eq!(read_all(&store, &desc, 0), b"hello world");
    }

    #[test]
    fn empty_object_roundtrip() {
        let (_dir, store) = new_store();
        let desc = put_bytes(&store, b"");
        assert_eq!(read_all(&store, &desc, 0), b"");
    }

    #[test]
    fn large_object_roundtrip() {
        let (_dir, store) = new_store();
        let content: Vec<u8> = (0..1_000_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let desc = put_bytes(&store, &content);
        assert_eq!(read_all(&store, &desc, 0), content);
    }

    #[test]
    fn put_is_idempotent_for_identical_content() {
        let (_dir, store) = new_store();
        let content = b"published twice";
        let desc = put_bytes(&store, content);
        store.put(&desc, &mut &content[..]).unwrap();
        assert_eq!(read_all(&store, &desc, 0), content);
    }

    // -----------------------------------------------------------------------
    // Partial reads
    // -----------------------------------------------------------------------

    #[test]
    fn get_from_offset_skips_decompressed_bytes() {
        let (_dir, store) = new_store();
        let desc = put_bytes(&store, b"hello world");
        assert_eq!(read_all(&store, &desc, 6), b"world");
    }

    #[test]
    fn get_from_offset_at_length_is_empty() {
        let (_dir, store) = new_store();
        let desc = put_bytes(&store, b"hello world");
        assert_eq!(read_all(&store, &desc, 11), b"");
    }

    #[test]
    fn get_from_offset_past_end_is_unexpected_eof() {
        let (_dir, store) = new_store();
        let desc = put_bytes(&store, b"hello world");
        match store.get(&desc, 12).err().unwrap() {
            StoreError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io(UnexpectedEof), got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Verification before publish
    // -----------------------------------------------------------------------

    #[test]
    fn size_mismatch_publishes_nothing() {
        let (_dir, store) = new_store();
        let content = b"eleven bytes";
        let desc = ContentDescriptor::new(Oid::from_bytes(content), 99);
        match store.put(&desc, &mut &content[..]).unwrap_err() {
            StoreError::SizeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 99);
                assert_eq!(actual, content.len() as u64);
            }
            other => panic!("expected SizeMismatch, got {other:?}"),
        }
        assert!(!store.exists(&desc));
    }

    #[test]
    fn hash_mismatch_publishes_nothing() {
        let (_dir, store) = new_store();
        let content = b"actual content";
        let desc = ContentDescriptor::new(Oid::from_bytes(b"advertised content"), content.len() as u64);
        match store.put(&desc, &mut &content[..]).unwrap_err() {
            StoreError::HashMismatch { expected, computed } => {
                assert_eq!(expected, desc.oid);
                assert_eq!(computed, Oid::from_bytes(content));
            }
            other => panic!("expected HashMismatch, got {other:?}"),
        }
        assert!(!store.exists(&desc));
    }

    #[test]
    fn failed_put_leaves_no_temp_file() {
        let (_dir, store) = new_store();
        let content = b"rejected";
        let desc = ContentDescriptor::new(Oid::from_bytes(content), 1);
        store.put(&desc, &mut &content[..]).unwrap_err();

        let tmp = with_suffix(&object_path_of(&store, &desc.oid), ".tmp");
        assert!(!tmp.exists());
        assert!(!object_path_of(&store, &desc.oid).exists());
    }

    #[test]
    fn source_error_aborts_put_and_cleans_up() {
        struct FailingSource;
        impl Read for FailingSource {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
            }
        }

        let (_dir, store) = new_store();
        let desc = ContentDescriptor::for_bytes(b"never arrives");
        match store.put(&desc, &mut FailingSource).unwrap_err() {
            StoreError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected Io, got {other:?}"),
        }
        assert!(!store.exists(&desc));
        let tmp = with_suffix(&object_path_of(&store, &desc.oid), ".tmp");
        assert!(!tmp.exists());
    }

    // -----------------------------------------------------------------------
    // Existence
    // -----------------------------------------------------------------------

    #[test]
    fn exists_flips_only_on_successful_put() {
        let (_dir, store) = new_store();
        let content = b"now you see me";
        let desc = ContentDescriptor::for_bytes(content);
        assert!(!store.exists(&desc));
        store.put(&desc, &mut &content[..]).unwrap();
        assert!(store.exists(&desc));
    }

    #[test]
    fn exists_ignores_directory_squatting_on_object_path() {
        let (_dir, store) = new_store();
        let desc = ContentDescriptor::for_bytes(b"shadowed");
        fs::create_dir_all(object_path_of(&store, &desc.oid)).unwrap();
        assert!(!store.exists(&desc));
    }

    // -----------------------------------------------------------------------
    // On-disk layout
    // -----------------------------------------------------------------------

    #[test]
    fn published_object_lands_in_sharded_path() {
        let (_dir, store) = new_store();
        let desc = put_bytes(&store, b"hello world");
        // SHA-256("hello world") starts with b94d27b9…
        let expected = store
            .root()
            .join("b9")
            .join("4d")
            .join(format!("{}.gz", &desc.oid.as_str()[4..]));
        assert!(expected.is_file());
        assert_eq!(expected, object_path_of(&store, &desc.oid));
    }

    #[test]
    fn stored_object_is_compressed() {
        let (_dir, store) = new_store();
        let content = vec![0u8; 64 * 1024];
        let desc = put_bytes(&store, &content);
        let on_disk = fs::metadata(object_path_of(&store, &desc.oid)).unwrap().len();
        assert!(on_disk < content.len() as u64 / 10);
    }

    // -----------------------------------------------------------------------
    // Missing and corrupt objects
    // -----------------------------------------------------------------------

    #[test]
    fn get_missing_object_is_not_found() {
        let (_dir, store) = new_store();
        let desc = ContentDescriptor::for_bytes(b"never stored");
        match store.get(&desc, 0).err().unwrap() {
            StoreError::NotFound(oid) => assert_eq!(oid, desc.oid),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn get_rejects_foreign_file_at_object_path() {
        let (_dir, store) = new_store();
        let desc = ContentDescriptor::for_bytes(b"clobbered");
        let path = object_path_of(&store, &desc.oid);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"plain text, not gzip").unwrap();

        match store.get(&desc, 0).err().unwrap() {
            StoreError::CorruptObject { oid, .. } => assert_eq!(oid, desc.oid),
            other => panic!("expected CorruptObject, got {other:?}"),
        }
    }

    #[test]
    fn get_rejects_truncated_container() {
        let (_dir, store) = new_store();
        let desc = ContentDescriptor::for_bytes(b"cut short");
        let path = object_path_of(&store, &desc.oid);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, [0x1f]).unwrap();

        assert!(matches!(
            store.get(&desc, 0).err().unwrap(),
            StoreError::CorruptObject { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Writer exclusion
    // -----------------------------------------------------------------------

    #[test]
    fn second_writer_for_same_identifier_fails_fast() {
        let (_dir, store) = new_store();
        let content = b"contended";
        let desc = ContentDescriptor::for_bytes(content);

        // A racing writer holds the temp file for this identifier.
        let tmp = with_suffix(&object_path_of(&store, &desc.oid), ".tmp");
        fs::create_dir_all(tmp.parent().unwrap()).unwrap();
        fs::write(&tmp, b"in flight").unwrap();

        match store.put(&desc, &mut &content[..]).unwrap_err() {
            StoreError::WriteInProgress(oid) => assert_eq!(oid, desc.oid),
            other => panic!("expected WriteInProgress, got {other:?}"),
        }
        assert!(!store.exists(&desc));
    }

    #[test]
    fn concurrent_writers_for_different_identifiers_never_interfere() {
        use std::sync::Arc;
        use std::thread;

        let (_dir, store) = new_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let content = vec![i; 1024];
                    let desc = ContentDescriptor::for_bytes(&content);
                    store.put(&desc, &mut &content[..]).unwrap();
                    assert_eq!(read_all(&store, &desc, 0), content);
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }
}
