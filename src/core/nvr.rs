//! core::nvr
//!
//! Name-Version-Release parsing for RPM identifiers.
//!
//! # Example
//!
//! ```
//! use distmirror::core::nvr::Nvr;
//!
//! let nvr = Nvr::parse("httpd-2.4.37-21.el8").unwrap();
//! assert_eq!(nvr.name, "httpd");
//! assert_eq!(nvr.version, "2.4.37");
//! assert_eq!(nvr.release, "21.el8");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NVR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)-([\w~%.+]+)-(\w+(?:\.[\w+]+)+?)(?:\.(\w+))?(?:\.rpm)?$")
        .expect("NVR pattern is valid")
});

/// A parsed RPM Name-Version-Release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nvr {
    pub name: String,
    pub version: String,
    pub release: String,
    /// Trailing component after the release (`src` for source packages)
    pub dist: Option<String>,
}

impl Nvr {
    /// Parse an NVR, tolerating a trailing `.<arch>` and `.rpm`.
    ///
    /// Returns `None` when the input has no recognizable release.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = NVR_PATTERN.captures(input)?;
        Some(Self {
            name: caps[1].to_string(),
            version: caps[2].to_string(),
            release: caps[3].to_string(),
            dist: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// The version/release pair reported for a published branch.
    pub fn branch_version(&self) -> BranchVersion {
        BranchVersion {
            version: self.version.clone(),
            release: self.release.clone(),
        }
    }
}

/// Version and release of the package published on a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchVersion {
    pub version: String,
    pub release: String,
}

/// Derive the `<version>-<release>` string used in synthesized changelog
/// stanzas from an import name such as `httpd-2.4.37-21.el8`.
///
/// The package name is dropped, then everything from the first `.el` (or,
/// failing that, `.module`) onwards. Without either suffix there is no
/// derived version and the spec's own `Version` field is used instead.
///
/// # Example
///
/// ```
/// use distmirror::core::nvr::changelog_version;
///
/// assert_eq!(changelog_version("httpd-2.4.37-21.el8", "httpd").as_deref(), Some("2.4.37-21"));
/// assert_eq!(changelog_version("bash-5.1-1.fc34", "bash"), None);
/// assert_eq!(changelog_version("bare", "bare"), None);
/// ```
pub fn changelog_version(import_name: &str, package: &str) -> Option<String> {
    let remainder = match import_name.strip_prefix(package) {
        Some(rest) => rest.strip_prefix('-')?,
        None => import_name.split_once('-')?.1,
    };
    [".el", ".module"]
        .into_iter()
        .find_map(|suffix| remainder.split_once(suffix))
        .map(|(version, _)| version.to_string())
}
