//! core::naming
//!
//! Naming conventions shared by the downstream forge layout.
//!
//! # Features
//!
//! - Escape package names the way the downstream forge stores them
//! - Build repository URLs for rpms, modules and patch repositories
//! - Derive the https form of an ssh upstream prefix

/// Kind of downstream repository a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    /// Package repositories (`<prefix>/rpms/<name>.git`)
    Rpms,
    /// Module repositories (`<prefix>/modules/<name>.git`)
    Modules,
    /// Patch repositories (`<prefix>/patch/<name>.git`)
    Patch,
}

impl RepoKind {
    /// Path segment used in the repository URL.
    pub fn segment(self) -> &'static str {
        match self {
            RepoKind::Rpms => "rpms",
            RepoKind::Modules => "modules",
            RepoKind::Patch => "patch",
        }
    }
}

/// Escape a package name for use as a downstream repository name.
///
/// The forge reserves `tree` and does not accept `+` in project paths.
///
/// # Example
///
/// ```
/// use distmirror::core::naming::gitlabify;
///
/// assert_eq!(gitlabify("gcc-c++"), "gcc-cplusplus");
/// assert_eq!(gitlabify("tree"), "treepkg");
/// assert_eq!(gitlabify("bash"), "bash");
/// ```
pub fn gitlabify(name: &str) -> String {
    if name == "tree" {
        return "treepkg".to_string();
    }

    name.replace('+', "plus")
}

/// Build the downstream repository URL for a package or module.
///
/// # Example
///
/// ```
/// use distmirror::core::naming::{repo_url, RepoKind};
///
/// assert_eq!(
///     repo_url("https://git.example.org/staging", RepoKind::Rpms, "gcc-c++"),
///     "https://git.example.org/staging/rpms/gcc-cplusplus.git"
/// );
/// ```
pub fn repo_url(upstream_prefix: &str, kind: RepoKind, name: &str) -> String {
    format!(
        "{}/{}/{}.git",
        upstream_prefix.trim_end_matches('/'),
        kind.segment(),
        gitlabify(name)
    )
}

/// Derive the `https://host/path` form of an upstream prefix.
///
/// Module metadata must reference component repositories over https even
/// when the importer itself pushes over ssh.
///
/// # Example
///
/// ```
/// use distmirror::core::naming::https_prefix;
///
/// assert_eq!(https_prefix("ssh://git@git.example.org/staging"), "https://git.example.org/staging");
/// assert_eq!(https_prefix("git@git.example.org:staging"), "https://git.example.org/staging");
/// assert_eq!(https_prefix("https://git.example.org/staging"), "https://git.example.org/staging");
/// ```
pub fn https_prefix(upstream_prefix: &str) -> String {
    let trimmed = upstream_prefix.trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        return trimmed.to_string();
    }

    let rest = trimmed
        .strip_prefix("ssh://")
        .or_else(|| trimmed.strip_prefix("git://"))
        .unwrap_or(trimmed);
    let rest = match rest.split_once('@') {
        Some((_, host_and_path)) => host_and_path,
        None => rest,
    };
    // scp-like syntax uses host:path
    let rest = match rest.split_once(':') {
        Some((host, path)) if !path.starts_with("//") => format!("{host}/{path}"),
        _ => rest.to_string(),
    };

    format!("https://{rest}")
}
