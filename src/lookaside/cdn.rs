//! lookaside::cdn
//!
//! Origin URL templates for lookaside downloads.
//!
//! A template may use the placeholders `{name}`, `{branch}`, `{hash}`,
//! `{hashtype}` and `{filename}`. A plain base URL without placeholders is
//! expanded with the `<base>/<name>/<branch>/<hash>` layout.

use super::checksum::HashAlgorithm;

/// Default origin for lookaside blobs.
pub const DEFAULT_CDN_URL: &str = "https://git.centos.org/sources";

/// Well-known origin layouts selectable by name.
pub const NAMED_TEMPLATES: &[(&str, &str)] = &[
    ("centos", "https://git.centos.org/sources/{name}/{branch}/{hash}"),
    (
        "centos-stream",
        "https://sources.stream.centos.org/sources/rpms/{name}/{filename}/{hashtype}/{hash}/{filename}",
    ),
    (
        "fedora",
        "https://src.fedoraproject.org/repo/pkgs/{name}/{filename}/{hashtype}/{hash}/{filename}",
    ),
    ("rocky", "https://sources.build.resf.org/{hash}"),
    ("rocky8", "https://rocky-linux-sources-staging.a1.rockylinux.org/{hash}"),
];

/// Look up a named template.
pub fn named_template(name: &str) -> Option<&'static str> {
    NAMED_TEMPLATES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, t)| *t)
}

/// What an origin URL is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginRequest<'a> {
    pub name: &'a str,
    pub branch: &'a str,
    pub digest: &'a str,
    /// Path as listed in the metadata file
    pub path: &'a str,
}

/// Expand a template (or plain base URL) for a blob.
///
/// # Example
///
/// ```
/// use distmirror::lookaside::cdn::{origin_url, OriginRequest};
///
/// let req = OriginRequest { name: "httpd", branch: "c8", digest: "abc", path: "SOURCES/httpd.tar.bz2" };
/// assert_eq!(
///     origin_url("https://git.centos.org/sources", &req),
///     "https://git.centos.org/sources/httpd/c8/abc"
/// );
/// assert_eq!(
///     origin_url("https://cdn.example/{hashtype}/{filename}/{hash}", &req),
///     "https://cdn.example/unknown/httpd.tar.bz2/abc"
/// );
/// ```
pub fn origin_url(template: &str, req: &OriginRequest<'_>) -> String {
    if !template.contains('{') {
        return format!(
            "{}/{}/{}/{}",
            template.trim_end_matches('/'),
            req.name,
            req.branch,
            req.digest
        );
    }

    let hashtype = HashAlgorithm::from_digest(req.digest)
        .map(|a| a.name())
        .unwrap_or("unknown");
    let filename = crate::core::paths::base_name(req.path);

    template
        .replace("{name}", req.name)
        .replace("{branch}", req.branch)
        .replace("{hash}", req.digest)
        .replace("{hashtype}", hashtype)
        .replace("{filename}", filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(digest: &str) -> OriginRequest<'_> {
        OriginRequest {
            name: "bash",
            branch: "c8-stream-1",
            digest,
            path: "SOURCES/bash-4.4.tar.gz",
        }
    }

    #[test]
    fn plain_base_trailing_slash() {
        assert_eq!(
            origin_url("https://cdn.example/sources/", &request("d")),
            "https://cdn.example/sources/bash/c8-stream-1/d"
        );
    }

    #[test]
    fn fedora_layout() {
        let sha = "a".repeat(128);
        let url = origin_url(named_template("fedora").unwrap(), &request(&sha));
        assert_eq!(
            url,
            format!(
                "https://src.fedoraproject.org/repo/pkgs/bash/bash-4.4.tar.gz/sha512/{sha}/bash-4.4.tar.gz"
            )
        );
    }

    #[test]
    fn named_lookup_is_case_insensitive() {
        assert!(named_template("Rocky").is_some());
        assert!(named_template("centos-stream").is_some());
        assert!(named_template("debian").is_none());
    }
}
