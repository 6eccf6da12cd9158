//! storage
//!
//! Content addressed blob storage for lookaside sources.
//!
//! # Architecture
//!
//! Blobs are stored through the [`BlobStorage`] trait:
//!
//! - [`FileBlobStorage`]: a local directory (`file://<path>`)
//! - [`MemoryBlobStorage`]: in-process, records operations (`memory://`)
//!
//! `s3://` and `gs://` addresses are recognized so configuration can be
//! validated, but those backends are not built into this binary.
//!
//! # Example
//!
//! ```
//! use distmirror::storage::create_storage;
//!
//! let storage = create_storage("memory://").unwrap();
//! assert!(!storage.exists("abc").unwrap());
//! assert!(create_storage("ftp://nope").is_err());
//! ```

mod file_store;
mod memory_store;
mod traits;

use std::path::PathBuf;

pub use file_store::FileBlobStorage;
pub use memory_store::MemoryBlobStorage;
pub use traits::{BlobStorage, StorageError};

/// A parsed storage address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageAddr {
    File(PathBuf),
    S3(String),
    Gcs(String),
    Memory,
}

impl StorageAddr {
    /// Parse an address by scheme.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidAddress` for an unknown scheme or an
    /// empty location.
    pub fn parse(addr: &str) -> Result<Self, StorageError> {
        let invalid = || StorageError::InvalidAddress(addr.to_string());

        if addr == "memory://" {
            return Ok(Self::Memory);
        }
        let (scheme, rest) = addr.split_once("://").ok_or_else(invalid)?;
        if rest.is_empty() {
            return Err(invalid());
        }
        match scheme {
            "file" => Ok(Self::File(PathBuf::from(rest))),
            "s3" => Ok(Self::S3(rest.to_string())),
            "gs" => Ok(Self::Gcs(rest.to_string())),
            _ => Err(invalid()),
        }
    }
}

/// Create a blob storage backend from an address.
///
/// # Errors
///
/// - Unknown or malformed address
/// - `s3://` and `gs://`, which are not built in
pub fn create_storage(addr: &str) -> Result<Box<dyn BlobStorage>, StorageError> {
    match StorageAddr::parse(addr)? {
        StorageAddr::File(root) => Ok(Box::new(FileBlobStorage::new(root))),
        StorageAddr::Memory => Ok(Box::new(MemoryBlobStorage::new())),
        StorageAddr::S3(bucket) => Err(StorageError::Unsupported(format!(
            "s3 bucket '{bucket}' (use a file:// mirror of the bucket)"
        ))),
        StorageAddr::Gcs(bucket) => Err(StorageError::Unsupported(format!(
            "gcs bucket '{bucket}' (use a file:// mirror of the bucket)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_schemes() {
        assert_eq!(
            StorageAddr::parse("file:///srv/blobs").unwrap(),
            StorageAddr::File(PathBuf::from("/srv/blobs"))
        );
        assert_eq!(
            StorageAddr::parse("s3://bucket").unwrap(),
            StorageAddr::S3("bucket".into())
        );
        assert_eq!(
            StorageAddr::parse("gs://bucket").unwrap(),
            StorageAddr::Gcs("bucket".into())
        );
        assert_eq!(StorageAddr::parse("memory://").unwrap(), StorageAddr::Memory);
    }

    #[test]
    fn rejects_unknown_or_empty() {
        for addr in ["", "/srv/blobs", "ftp://x", "file://", "s3://"] {
            assert!(
                matches!(StorageAddr::parse(addr), Err(StorageError::InvalidAddress(_))),
                "{addr} should be rejected"
            );
        }
    }

    #[test]
    fn cloud_backends_are_unsupported() {
        match create_storage("s3://bucket") {
            Err(StorageError::Unsupported(msg)) => assert!(msg.contains("bucket")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn file_backend_is_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let addr = format!("file://{}", dir.path().display());
        let storage = create_storage(&addr).unwrap();
        storage.write("k", b"v").unwrap();
        assert!(dir.path().join("k").is_file());
    }
}
