//! lookaside::manager
//!
//! Retrieval, verification and upload of lookaside blobs.
//!
//! # Retrieval order
//!
//! 1. The run cache (bytes already verified earlier in this run)
//! 2. Blob storage, unless downloads from storage are disabled
//! 3. The origin URL built from the configured template
//!
//! Bytes from storage or the origin are checked against the digest before
//! they are cached or used.
//!
//! # Upload
//!
//! Each digest is written to storage at most once per run. A digest is
//! skipped if it was already handled in this run, if uploads are disabled,
//! or if the backend already has it.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::cdn::{origin_url, OriginRequest};
use super::checksum;
use super::entries::LookasideList;
use super::metadata::{render, MetadataLine};
use super::origin::OriginFetcher;
use super::LookasideError;
use crate::core::paths::metadata_file_name;
use crate::storage::BlobStorage;

/// Switches that affect where blobs come from and go to.
#[derive(Debug, Clone, Default)]
pub struct BlobOptions {
    /// Origin URL or template
    pub origin_template: String,
    /// Never read from blob storage
    pub no_download: bool,
    /// Never write to blob storage
    pub no_upload: bool,
}

/// Where a retrieved blob came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobSource {
    Cache,
    Storage,
    Origin,
}

/// Run-scoped blob manager.
///
/// The cache and the uploaded set live as long as the manager, so one
/// manager must be shared by every branch of a run.
pub struct BlobManager {
    storage: Box<dyn BlobStorage>,
    fetcher: Box<dyn OriginFetcher>,
    options: BlobOptions,
    cache: HashMap<String, Vec<u8>>,
    uploaded: HashSet<String>,
}

impl BlobManager {
    pub fn new(
        storage: Box<dyn BlobStorage>,
        fetcher: Box<dyn OriginFetcher>,
        options: BlobOptions,
    ) -> Self {
        Self {
            storage,
            fetcher,
            options,
            cache: HashMap::new(),
            uploaded: HashSet::new(),
        }
    }

    /// Get verified bytes for a digest.
    ///
    /// # Errors
    ///
    /// - Storage or download failures
    /// - `LookasideError::ChecksumMismatch` if fetched bytes do not match
    pub fn retrieve(&mut self, req: &OriginRequest<'_>) -> Result<Vec<u8>, LookasideError> {
        let (bytes, _) = self.retrieve_with_source(req)?;
        Ok(bytes)
    }

    /// Like [`retrieve`](Self::retrieve), also reporting where the bytes
    /// came from.
    pub fn retrieve_with_source(
        &mut self,
        req: &OriginRequest<'_>,
    ) -> Result<(Vec<u8>, BlobSource), LookasideError> {
        let key = req.digest.to_ascii_lowercase();
        if let Some(bytes) = self.cache.get(&key) {
            debug!(digest = %key, "retrieving from cache");
            return Ok((bytes.clone(), BlobSource::Cache));
        }

        let stored = if self.options.no_download {
            None
        } else {
            self.storage.read(&key)?
        };

        let (bytes, source) = match stored {
            Some(bytes) => {
                info!(digest = %key, "downloading from blob storage");
                (bytes, BlobSource::Storage)
            }
            None => {
                let url = origin_url(&self.options.origin_template, req);
                info!(url = %url, "downloading from origin");
                (self.fetcher.fetch(&url)?, BlobSource::Origin)
            }
        };

        if checksum::verify(&bytes, req.digest).is_none() {
            return Err(LookasideError::ChecksumMismatch {
                digest: req.digest.to_string(),
                path: req.path.to_string(),
            });
        }

        self.cache.insert(key, bytes.clone());
        Ok((bytes, source))
    }

    /// Write the metadata control file for `package` into `tree` and upload
    /// the blobs it lists.
    ///
    /// Only live entries whose file exists under `tree` are included.
    /// Returns the lines written.
    pub fn publish(
        &mut self,
        tree: &Path,
        package: &str,
        entries: &LookasideList,
    ) -> Result<Vec<MetadataLine>, LookasideError> {
        let mut lines = Vec::new();

        for entry in entries.live() {
            let full = tree.join(&entry.path);
            if !full.is_file() {
                debug!(path = %entry.path, "lookaside entry not in tree, skipping");
                continue;
            }

            let bytes = fs::read(&full).map_err(|e| LookasideError::Io {
                path: full.clone(),
                source: e,
            })?;
            let digest = entry.algorithm.hex_digest(&bytes);
            self.upload(&digest, &bytes)?;
            lines.push(MetadataLine::new(digest, entry.path.clone()));
        }

        let metadata_path = tree.join(metadata_file_name(package));
        fs::write(&metadata_path, render(&lines)).map_err(|e| LookasideError::Io {
            path: metadata_path,
            source: e,
        })?;

        Ok(lines)
    }

    fn upload(&mut self, digest: &str, bytes: &[u8]) -> Result<(), LookasideError> {
        if self.uploaded.contains(digest) {
            debug!(digest, "already uploaded in this run");
            return Ok(());
        }

        if self.options.no_upload {
            debug!(digest, "uploads disabled");
        } else if self.storage.exists(digest)? {
            debug!(digest, "already in blob storage");
        } else {
            self.storage.write(digest, bytes)?;
            info!(digest, size = bytes.len(), "wrote to blob storage");
        }

        self.uploaded.insert(digest.to_string());
        Ok(())
    }

    /// Digests handled by [`publish`](Self::publish) so far.
    pub fn uploaded(&self) -> &HashSet<String> {
        &self.uploaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookaside::checksum::HashAlgorithm;
    use crate::storage::MemoryBlobStorage;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Serves fixed bytes and records requested URLs.
    #[derive(Clone, Default)]
    struct FixedFetcher {
        body: Vec<u8>,
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl OriginFetcher for FixedFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, LookasideError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.body.clone())
        }
    }

    fn manager(storage: MemoryBlobStorage, fetcher: FixedFetcher, options: BlobOptions) -> BlobManager {
        BlobManager::new(Box::new(storage), Box::new(fetcher), options)
    }

    fn options() -> BlobOptions {
        BlobOptions {
            origin_template: "https://cdn.example/sources".into(),
            ..Default::default()
        }
    }

    fn request(digest: &str) -> OriginRequest<'_> {
        OriginRequest {
            name: "httpd",
            branch: "c8",
            digest,
            path: "SOURCES/httpd.tar.bz2",
        }
    }

    #[test]
    fn origin_then_cache() {
        let body = b"tarball".to_vec();
        let digest = HashAlgorithm::Sha256.hex_digest(&body);
        let fetcher = FixedFetcher {
            body: body.clone(),
            ..Default::default()
        };
        let mut blobs = manager(MemoryBlobStorage::new(), fetcher.clone(), options());

        let (bytes, source) = blobs.retrieve_with_source(&request(&digest)).unwrap();
        assert_eq!(bytes, body);
        assert_eq!(source, BlobSource::Origin);
        assert_eq!(
            fetcher.urls.lock().unwrap().as_slice(),
            [format!("https://cdn.example/sources/httpd/c8/{digest}")]
        );

        let (_, source) = blobs.retrieve_with_source(&request(&digest)).unwrap();
        assert_eq!(source, BlobSource::Cache);
        assert_eq!(fetcher.urls.lock().unwrap().len(), 1);
    }

    #[test]
    fn storage_before_origin() {
        let body = b"stored".to_vec();
        let digest = HashAlgorithm::Md5.hex_digest(&body);
        let storage = MemoryBlobStorage::with_objects([(digest.clone(), body.clone())]);
        let fetcher = FixedFetcher::default();
        let mut blobs = manager(storage, fetcher.clone(), options());

        let (_, source) = blobs.retrieve_with_source(&request(&digest)).unwrap();
        assert_eq!(source, BlobSource::Storage);
        assert!(fetcher.urls.lock().unwrap().is_empty());
    }

    #[test]
    fn no_download_skips_storage() {
        let body = b"stored".to_vec();
        let digest = HashAlgorithm::Sha1.hex_digest(&body);
        let storage = MemoryBlobStorage::with_objects([(digest.clone(), body.clone())]);
        let fetcher = FixedFetcher {
            body,
            ..Default::default()
        };
        let mut blobs = manager(
            storage.clone(),
            fetcher,
            BlobOptions {
                no_download: true,
                ..options()
            },
        );

        let (_, source) = blobs.retrieve_with_source(&request(&digest)).unwrap();
        assert_eq!(source, BlobSource::Origin);
        assert!(storage.reads().is_empty());
    }

    #[test]
    fn mismatched_origin_bytes_are_rejected() {
        let digest = HashAlgorithm::Sha256.hex_digest(b"expected");
        let fetcher = FixedFetcher {
            body: b"tampered".to_vec(),
            ..Default::default()
        };
        let mut blobs = manager(MemoryBlobStorage::new(), fetcher, options());

        assert!(matches!(
            blobs.retrieve(&request(&digest)),
            Err(LookasideError::ChecksumMismatch { .. })
        ));
        // nothing cached after a failure
        assert!(blobs.cache.is_empty());
    }

    #[test]
    fn publish_writes_metadata_and_dedups_uploads() {
        let tree = TempDir::new().unwrap();
        fs::create_dir_all(tree.path().join("SOURCES")).unwrap();
        fs::write(tree.path().join("SOURCES/a.tar.gz"), b"same").unwrap();
        fs::write(tree.path().join("SOURCES/b.tar.gz"), b"same").unwrap();

        let mut entries = LookasideList::new();
        entries.track("SOURCES/a.tar.gz", HashAlgorithm::Sha256);
        entries.track("SOURCES/b.tar.gz", HashAlgorithm::Sha256);
        entries.track("SOURCES/missing.tar.gz", HashAlgorithm::Sha256);
        entries.track("SOURCES/expired.tar.gz", HashAlgorithm::Sha256);
        entries.expire("SOURCES/expired.tar.gz");
        fs::write(tree.path().join("SOURCES/expired.tar.gz"), b"old").unwrap();

        let storage = MemoryBlobStorage::new();
        let mut blobs = manager(storage.clone(), FixedFetcher::default(), options());
        let lines = blobs.publish(tree.path(), "httpd", &entries).unwrap();

        let digest = HashAlgorithm::Sha256.hex_digest(b"same");
        assert_eq!(lines.len(), 2);
        assert_eq!(storage.writes(), vec![digest.clone()]);
        assert_eq!(
            fs::read_to_string(tree.path().join(".httpd.metadata")).unwrap(),
            format!("{digest} SOURCES/a.tar.gz\n{digest} SOURCES/b.tar.gz\n")
        );

        // a second branch in the same run does not upload again
        blobs.publish(tree.path(), "httpd", &entries).unwrap();
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn publish_respects_no_upload_and_existing_objects() {
        let tree = TempDir::new().unwrap();
        fs::write(tree.path().join("a.tar"), b"a").unwrap();
        let mut entries = LookasideList::new();
        entries.track("a.tar", HashAlgorithm::Sha256);

        let storage = MemoryBlobStorage::new();
        let mut blobs = manager(
            storage.clone(),
            FixedFetcher::default(),
            BlobOptions {
                no_upload: true,
                ..options()
            },
        );
        blobs.publish(tree.path(), "x", &entries).unwrap();
        assert_eq!(storage.write_count(), 0);

        let digest = HashAlgorithm::Sha256.hex_digest(b"a");
        let storage = MemoryBlobStorage::with_objects([(digest.clone(), b"a".to_vec())]);
        let mut blobs = manager(storage.clone(), FixedFetcher::default(), options());
        blobs.publish(tree.path(), "x", &entries).unwrap();
        assert_eq!(storage.write_count(), 0);
        assert!(blobs.uploaded().contains(&digest));
    }
}
