//! storage::memory_store
//!
//! In-process blob storage that records every operation.
//!
//! # Design
//!
//! Used for tests and dry runs. Clones share state, so a test can hand one
//! clone to the pipeline and inspect the other afterwards.
//!
//! # Example
//!
//! ```
//! use distmirror::storage::{BlobStorage, MemoryBlobStorage};
//!
//! let storage = MemoryBlobStorage::new();
//! let handle = storage.clone();
//!
//! storage.write("abc", b"data").unwrap();
//! assert_eq!(handle.writes(), vec!["abc".to_string()]);
//! assert!(handle.exists("abc").unwrap());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::traits::{BlobStorage, StorageError};

/// Memory-backed blob storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    objects: HashMap<String, Vec<u8>>,
    /// Keys passed to `write`, in call order.
    writes: Vec<String>,
    /// Keys passed to `read`, in call order.
    reads: Vec<String>,
    fail_writes: bool,
}

impl MemoryBlobStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with objects. Seeding is not recorded
    /// as writes.
    pub fn with_objects<I, K>(objects: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.inner();
            for (key, bytes) in objects {
                inner.objects.insert(key.into(), bytes);
            }
        }
        store
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self) {
        self.inner().fail_writes = true;
    }

    /// Keys written so far, in order (duplicates included).
    pub fn writes(&self) -> Vec<String> {
        self.inner().writes.clone()
    }

    /// Number of write calls so far.
    pub fn write_count(&self) -> usize {
        self.inner().writes.len()
    }

    /// Number of write calls for a single key.
    pub fn writes_for(&self, key: &str) -> usize {
        self.inner().writes.iter().filter(|k| *k == key).count()
    }

    /// Keys read so far, in order.
    pub fn reads(&self) -> Vec<String> {
        self.inner().reads.clone()
    }

    /// Stored bytes for a key, without recording a read.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner().objects.get(key).cloned()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStorage for MemoryBlobStorage {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner();
        if inner.fail_writes {
            return Err(StorageError::Write {
                key: key.to_string(),
                message: "configured to fail".to_string(),
            });
        }
        inner.writes.push(key.to_string());
        inner.objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut inner = self.inner();
        inner.reads.push(key.to_string());
        Ok(inner.objects.get(key).cloned())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.inner().objects.contains_key(key))
    }
}
