use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::RwLock;

use lode_types::{ContentDescriptor, Oid};

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// In-memory, `HashMap`-based content store.
///
/// Intended for tests and embedding. Objects are held decompressed behind a
/// `RwLock`; the same verify-before-visible contract applies as for the
/// durable store, so an object is never observable under a descriptor it
/// does not match. There is no temp-file machinery, hence no
/// [`StoreError::WriteInProgress`] from this backend.
pub struct InMemoryContentStore {
    objects: RwLock<HashMap<Oid, Vec<u8>>>,
}

impl InMemoryContentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total decompressed bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|content| content.len() as u64)
            .sum()
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryContentStore {
    fn put(&self, desc: &ContentDescriptor, source: &mut dyn Read) -> StoreResult<()> {
        let mut content = Vec::new();
        source.read_to_end(&mut content)?;

        if content.len() as u64 != desc.size {
            return Err(StoreError::SizeMismatch {
                oid: desc.oid.clone(),
                expected: desc.size,
                actual: content.len() as u64,
            });
        }
        let computed = Oid::from_bytes(&content);
        if computed != desc.oid {
            return Err(StoreError::HashMismatch {
                expected: desc.oid.clone(),
                computed,
            });
        }

        let mut map = self.objects.write().expect("lock poisoned");
        // Idempotent: identical content always maps to the same identifier.
        map.entry(desc.oid.clone()).or_insert(content);
        Ok(())
    }

    fn get(&self, desc: &ContentDescriptor, from_byte: u64) -> StoreResult<Box<dyn Read + Send>> {
        let map = self.objects.read().expect("lock poisoned");
        let content = map
            .get(&desc.oid)
            .ok_or_else(|| StoreError::NotFound(desc.oid.clone()))?;
        if from_byte > content.len() as u64 {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "object {} ends at byte {}, before offset {from_byte}",
                    desc.oid.short(),
                    content.len()
                ),
            )));
        }
        Ok(Box::new(Cursor::new(content[from_byte as usize..].to_vec())))
    }

    fn exists(&self, desc: &ContentDescriptor) -> bool {
        self.objects
            .read()
            .expect("lock poisoned")
            .contains_key(&desc.oid)
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("object_count", &self.len())
            .finish()
    }
}
