//! lookaside::fetch
//!
//! Populate a checked-out package tree with its lookaside sources.
//!
//! The digests listed in the tree's metadata file are downloaded from a
//! flat origin (`<cdn-url>/<digest>`), verified, and written to the listed
//! paths.

use std::fs;
use std::path::Path;

use tracing::info;

use super::checksum;
use super::metadata::{self, MetadataLine};
use super::origin::OriginFetcher;
use super::LookasideError;

/// Download every blob listed in the metadata file under `dir`.
///
/// Returns the entries that were written.
///
/// # Errors
///
/// - No metadata file, or more than one
/// - Malformed metadata
/// - Download failures or checksum mismatches
pub fn fetch_sources(
    dir: &Path,
    cdn_url: &str,
    fetcher: &dyn OriginFetcher,
) -> Result<Vec<MetadataLine>, LookasideError> {
    let metadata_path =
        metadata::find_metadata_file(dir)?.ok_or_else(|| LookasideError::NoMetadataFile(dir.to_path_buf()))?;

    let contents = fs::read_to_string(&metadata_path).map_err(|e| LookasideError::Io {
        path: metadata_path.clone(),
        source: e,
    })?;
    let lines = metadata::parse(&contents)?;

    for line in &lines {
        let url = format!("{}/{}", cdn_url.trim_end_matches('/'), line.digest);
        info!(url = %url, path = %line.path, "downloading");
        let bytes = fetcher.fetch(&url)?;

        if checksum::verify(&bytes, &line.digest).is_none() {
            return Err(LookasideError::ChecksumMismatch {
                digest: line.digest.clone(),
                path: line.path.clone(),
            });
        }

        let target = dir.join(&line.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| LookasideError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(&target, &bytes).map_err(|e| LookasideError::Io {
            path: target.clone(),
            source: e,
        })?;
    }

    Ok(lines)
}
