//! storage::traits
//!
//! Blob storage trait definition.
//!
//! # Design
//!
//! Lookaside blobs are content addressed: the object key is the hex digest
//! of the content, so a key is written at most once and never rewritten
//! with different bytes.
//!
//! # Example
//!
//! ```
//! use distmirror::storage::{BlobStorage, MemoryBlobStorage, StorageError};
//!
//! fn upload(storage: &dyn BlobStorage, digest: &str, bytes: &[u8]) -> Result<(), StorageError> {
//!     if !storage.exists(digest)? {
//!         storage.write(digest, bytes)?;
//!     }
//!     Ok(())
//! }
//!
//! let storage = MemoryBlobStorage::new();
//! upload(&storage, "d41d8cd98f00b204e9800998ecf8427e", b"").unwrap();
//! assert_eq!(storage.write_count(), 1);
//! ```

use thiserror::Error;

/// Errors from blob storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage address did not name a known backend.
    #[error("invalid storage address '{0}' (expected file://, s3:// or gs://)")]
    InvalidAddress(String),

    /// The backend is recognized but not built into this binary.
    #[error("storage backend not available: {0}")]
    Unsupported(String),

    /// Failed to read an object.
    #[error("failed to read blob {key}: {message}")]
    Read { key: String, message: String },

    /// Failed to write an object.
    #[error("failed to write blob {key}: {message}")]
    Write { key: String, message: String },
}

/// Content addressed blob storage backend.
///
/// Keys are lowercase hex digests. Implementations must be thread-safe.
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` under `key`, replacing anything already there.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read the object stored under `key`.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Check whether an object exists.
    ///
    /// Default implementation uses `read()`.
    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read(key)?.is_some())
    }
}
