//! lookaside
//!
//! Content addressed handling of large source files.
//!
//! # Modules
//!
//! - [`checksum`] - Digest-length driven verification
//! - [`metadata`] - The `<digest> <path>` control file
//! - [`entries`] - Pending lookaside entries for the current branch
//! - [`manager`] - Retrieval order, run cache and upload dedup
//! - [`cdn`] - Origin URL templates
//! - [`origin`] - Origin downloads
//! - [`fetch`] - Standalone population of a checked-out tree

pub mod cdn;
pub mod checksum;
pub mod entries;
pub mod fetch;
pub mod manager;
pub mod metadata;
pub mod origin;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::GITIGNORE;
use crate::storage::StorageError;

pub use checksum::HashAlgorithm;
pub use entries::{LookasideEntry, LookasideList};
pub use manager::{BlobManager, BlobOptions, BlobSource};
pub use metadata::MetadataLine;
pub use origin::{HttpFetcher, OriginFetcher};

/// Errors from lookaside handling.
#[derive(Debug, Error)]
pub enum LookasideError {
    #[error("checksum mismatch for {path} (expected {digest})")]
    ChecksumMismatch { digest: String, path: String },

    #[error("malformed metadata line: '{0}'")]
    MalformedMetadata(String),

    #[error("more than one metadata file: {0:?}")]
    MultipleMetadataFiles(Vec<PathBuf>),

    #[error("no metadata file in {0}")]
    NoMetadataFile(PathBuf),

    #[error("could not download {url}: {message}")]
    Download { url: String, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Make sure every path in `paths` is listed in the tree's `.gitignore`.
///
/// Existing lines are kept in order; missing paths are appended. Returns
/// whether the file changed.
pub fn ensure_gitignore<'a>(
    tree: &Path,
    paths: impl IntoIterator<Item = &'a str>,
) -> Result<bool, LookasideError> {
    let path = tree.join(GITIGNORE);
    let existing = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(LookasideError::Io { path, source: e }),
    };

    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();
    let mut changed = false;
    for p in paths {
        if !lines.iter().any(|l| l.trim() == p) {
            lines.push(p.to_string());
            changed = true;
        }
    }

    if changed {
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&path, contents).map_err(|e| LookasideError::Io { path, source: e })?;
    }
    Ok(changed)
}
