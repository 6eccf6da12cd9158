//! core::types
//!
//! Strong types for the git names the importer produces.
//!
//! # Types
//!
//! - [`BranchName`] - Validated push branch name (e.g. `r8-stream-1.1`)
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//!
//! # Validation
//!
//! Push branches and import tags are computed from upstream ref names, so
//! anything the upstream forge accepted could in principle show up here.
//! These types reject names git itself would refuse before any tree is
//! assembled.
//!
//! # Examples
//!
//! ```
//! use distmirror::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("r8-stream-1.1").unwrap();
//! let tag = RefName::for_tag("imports/r8/bash-4.4.20-1.el8").unwrap();
//! assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/r8-stream-1.1");
//! assert_eq!(tag.as_str(), "refs/tags/imports/r8/bash-4.4.20-1.el8");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// String conversions shared by the validated name types.
macro_rules! string_newtype {
    ($name:ident) => {
        impl TryFrom<String> for $name {
            type Error = TypeError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Check a slash-separated name against git's refname rules.
///
/// Shared by [`BranchName`] and [`RefName`]; `what` is only used in the
/// error message.
fn check_ref_format(name: &str, what: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }
    if name == "@" {
        return Err(format!("{what} cannot be '@' (reserved)"));
    }
    if name.starts_with('-') {
        return Err(format!("{what} cannot start with '-'"));
    }
    if name.ends_with('/') || name.ends_with(".lock") || name.ends_with('.') {
        return Err(format!("{what} cannot end with '/', '.' or '.lock'"));
    }
    for bad in ["..", "@{", "//"] {
        if name.contains(bad) {
            return Err(format!("{what} cannot contain '{bad}'"));
        }
    }

    const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(format!("{what} cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Err(format!("{what} cannot contain control characters"));
    }

    for component in name.split('/') {
        if component.starts_with('.') {
            return Err("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Err("path component cannot end with '.lock'".into());
        }
    }

    Ok(())
}

/// A validated push branch name.
///
/// ```
/// use distmirror::core::types::BranchName;
///
/// assert_eq!(BranchName::new("r8").unwrap().as_str(), "r8");
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        check_ref_format(&name, "branch name").map_err(TypeError::InvalidBranchName)?;
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype!(BranchName);

/// A Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// ```
/// use distmirror::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype!(Oid);

/// A validated, fully qualified Git reference name (`refs/...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name is not under `refs/`
    /// or violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if !name.starts_with("refs/") {
            return Err(TypeError::InvalidRefName(format!(
                "'{name}' must start with 'refs/'"
            )));
        }
        check_ref_format(&name, "ref name").map_err(TypeError::InvalidRefName)?;
        Ok(Self(name))
    }

    /// Create a ref name for a branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Create a ref name for a tag (`refs/tags/<tag>`).
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the tag name is not valid.
    pub fn for_tag(tag: &str) -> Result<Self, TypeError> {
        Self::new(format!("refs/tags/{tag}"))
    }

    /// Strip a prefix from the ref name.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_newtype!(RefName);

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_push_branches() {
            for name in ["r8", "r8-stream-1.1", "r8-beta", "r9s-stream-rhel"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_invalid_names() {
            for name in ["", "@", "-x", "a..b", "a b", "x.lock", "a/", "a:b", "a//b"] {
                assert!(BranchName::new(name).is_err(), "{name} should be invalid");
            }
        }

        #[test]
        fn serde_roundtrip() {
            let name = BranchName::new("r8").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"r8\"");
            let parsed: BranchName = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, name);
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn normalizes_case() {
            let oid = Oid::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
            assert_eq!(oid.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        }

        #[test]
        fn rejects_bad_length_and_chars() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
            assert!(Oid::new("a".repeat(64)).is_ok());
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn tag_and_branch_constructors() {
            let tag = RefName::for_tag("imports/r8/httpd-2.4.37-21.el8").unwrap();
            assert_eq!(
                tag.strip_prefix("refs/tags/"),
                Some("imports/r8/httpd-2.4.37-21.el8")
            );

            let branch = RefName::for_branch(&BranchName::new("r8").unwrap());
            assert_eq!(branch.as_str(), "refs/heads/r8");
            assert_eq!(branch.strip_prefix("refs/tags/"), None);
        }

        #[test]
        fn requires_refs_prefix() {
            assert!(RefName::new("heads/main").is_err());
            assert!(RefName::new("refs/heads/main").is_ok());
        }

        #[test]
        fn percent_is_allowed_but_tilde_is_not() {
            assert!(RefName::for_tag("imports/r8/foo-1%2-1").is_ok());
            assert!(RefName::for_tag("imports/r8/foo-1~rc1-1").is_err());
        }
    }
}
