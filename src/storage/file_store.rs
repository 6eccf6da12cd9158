//! storage::file_store
//!
//! Filesystem blob storage (`file://` addresses).
//!
//! Objects are stored flat under the root directory, one file per digest.
//! Writes go through a temp file in the same directory and are renamed
//! into place.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::traits::{BlobStorage, StorageError};

/// Blob storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FileBlobStorage {
    root: PathBuf,
}

impl FileBlobStorage {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStorage for FileBlobStorage {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let werr = |e: std::io::Error| StorageError::Write {
            key: key.to_string(),
            message: e.to_string(),
        };

        fs::create_dir_all(&self.root).map_err(werr)?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.root).map_err(werr)?;
        temp.write_all(bytes).map_err(werr)?;
        temp.as_file().sync_all().map_err(werr)?;
        temp.persist(self.object_path(key))
            .map_err(|e| werr(e.error))?;

        debug!(key, size = bytes.len(), root = %self.root.display(), "stored blob");
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.object_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.object_path(key).is_file())
    }
}
