//! core::paths
//!
//! Layout of the normalized package tree.
//!
//! # Layout
//!
//! Every imported branch is normalized to:
//! - `SPECS/` - exactly one `.spec` file
//! - `SOURCES/` - patches, small sources and (untracked) lookaside blobs
//! - `.gitignore` - lookaside paths excluded from history
//! - `.<name>.metadata` - lookaside control file (`<digest> <path>` lines)
//!
//! Directive targets that do not name a top-level directory land in
//! `SOURCES/`.

use std::path::Path;

/// Directory holding the spec file.
pub const SPECS_DIR: &str = "SPECS";

/// Directory holding sources and patches.
pub const SOURCES_DIR: &str = "SOURCES";

/// Ignore file listing lookaside paths.
pub const GITIGNORE: &str = ".gitignore";

/// Name of the lookaside control file for a package.
///
/// # Example
///
/// ```
/// use distmirror::core::paths::metadata_file_name;
///
/// assert_eq!(metadata_file_name("httpd"), ".httpd.metadata");
/// ```
pub fn metadata_file_name(package: &str) -> String {
    format!(".{package}.metadata")
}

/// Route a relative path into `SOURCES/` unless it already names `SPECS/`
/// or `SOURCES/`.
///
/// # Example
///
/// ```
/// use distmirror::core::paths::with_sources_prefix;
///
/// assert_eq!(with_sources_prefix("fix.patch"), "SOURCES/fix.patch");
/// assert_eq!(with_sources_prefix("SPECS/httpd.spec"), "SPECS/httpd.spec");
/// assert_eq!(with_sources_prefix("SOURCES/a.tar.gz"), "SOURCES/a.tar.gz");
/// ```
pub fn with_sources_prefix(file: &str) -> String {
    if file.starts_with("SOURCES/") || file.starts_with("SPECS/") {
        return file.to_string();
    }

    format!("{SOURCES_DIR}/{file}")
}

/// Base name of a slash separated relative path.
pub fn base_name(file: &str) -> &str {
    Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file)
}

/// Whether a source file name should be kept out of git and stored in
/// the lookaside instead.
///
/// Tarballs of any compression qualify.
pub fn is_lookaside_candidate(file_name: &str) -> bool {
    file_name.contains(".tar")
}
