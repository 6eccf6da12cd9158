//! lookaside::metadata
//!
//! The lookaside control file: one `<hex-digest> <relative-path>` entry
//! per line.

use std::fs;
use std::path::{Path, PathBuf};

use super::LookasideError;

/// One entry of a metadata control file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLine {
    pub digest: String,
    pub path: String,
}

impl MetadataLine {
    pub fn new(digest: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            path: path.into(),
        }
    }
}

/// Parse a metadata control file. Blank lines are ignored.
///
/// # Errors
///
/// Returns `LookasideError::MalformedMetadata` for a line without a path.
///
/// # Example
///
/// ```
/// use distmirror::lookaside::metadata::parse;
///
/// let lines = parse("abc SOURCES/a.tar.gz\n\n").unwrap();
/// assert_eq!(lines.len(), 1);
/// assert_eq!(lines[0].digest, "abc");
/// assert_eq!(lines[0].path, "SOURCES/a.tar.gz");
/// ```
pub fn parse(contents: &str) -> Result<Vec<MetadataLine>, LookasideError> {
    let mut lines = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let (digest, path) = line
            .trim()
            .split_once(' ')
            .map(|(d, p)| (d.trim(), p.trim()))
            .filter(|(d, p)| !d.is_empty() && !p.is_empty())
            .ok_or_else(|| LookasideError::MalformedMetadata(line.to_string()))?;
        lines.push(MetadataLine::new(digest, path));
    }
    Ok(lines)
}

/// Render entries in control file format, one newline-terminated line each.
pub fn render(lines: &[MetadataLine]) -> String {
    lines
        .iter()
        .map(|l| format!("{} {}\n", l.digest, l.path))
        .collect()
}

/// Find the single `*.metadata` file at the top of `dir`.
///
/// Returns `Ok(None)` if there is none.
///
/// # Errors
///
/// Returns `LookasideError::MultipleMetadataFiles` if more than one exists.
pub fn find_metadata_file(dir: &Path) -> Result<Option<PathBuf>, LookasideError> {
    let entries = fs::read_dir(dir).map_err(|e| LookasideError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LookasideError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "metadata") {
            found.push(path);
        }
    }

    found.sort();
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(LookasideError::MultipleMetadataFiles(found)),
    }
}
