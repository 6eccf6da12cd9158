//! core::config
//!
//! Per-run settings and the optional configuration file.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Config file (see [`schema`] for the search order)
//! 3. CLI flags
//!
//! The CLI merges 2 and 3 into a single [`ConfigFile`] and hands it to
//! [`RunConfigBuilder::apply`]. [`RunConfigBuilder::build`] validates the
//! result and compiles the import pattern; the resulting [`RunConfig`] is
//! shared read-only by the rest of the run.
//!
//! # Example
//!
//! ```
//! use distmirror::core::config::{ConfigFile, RunConfig};
//!
//! let config = RunConfig::builder("bash")
//!     .apply(&ConfigFile {
//!         storage_addr: Some("memory://".into()),
//!         version: Some(9),
//!         ..Default::default()
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.package, "bash");
//! assert_eq!(config.version, 9);
//! assert_eq!(config.source_url(), "https://git.centos.org/rpms/bash");
//! ```

pub mod schema;

pub use schema::ConfigFile;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::naming::{repo_url, RepoKind};
use crate::core::nvr::Nvr;
use crate::lookaside::cdn;
use crate::resolve::{ManualCommit, Resolver, ResolverSettings};
use crate::storage::StorageAddr;

pub const DEFAULT_VERSION: u32 = 8;
pub const DEFAULT_MODULE_PREFIX: &str = "https://git.centos.org/modules";
pub const DEFAULT_RPM_PREFIX: &str = "https://git.centos.org/rpms";
pub const DEFAULT_UPSTREAM_PREFIX: &str = "https://git.rockylinux.org/staging";
pub const DEFAULT_SSH_USER: &str = "git";
pub const DEFAULT_COMMITTER_NAME: &str = "rockyautomation";
pub const DEFAULT_COMMITTER_EMAIL: &str = "rockyautomation@rockylinux.org";
pub const DEFAULT_IMPORT_BRANCH_PREFIX: &str = "c";
pub const DEFAULT_BRANCH_PREFIX: &str = "r";
pub const DEFAULT_PATCH_DIR: &str = "ROCKY";

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

impl ConfigFile {
    /// Locate and read the config file.
    ///
    /// `explicit` (from `--config`) must exist; the other locations are
    /// optional. Returns the parsed file and where it came from, or `None`
    /// when no file was found.
    ///
    /// # Errors
    ///
    /// Returns an error if a found file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Option<(ConfigFile, PathBuf)>, ConfigError> {
        if let Some(path) = explicit {
            return Ok(Some((Self::read(path)?, path.to_path_buf())));
        }

        match Self::locate() {
            Some(path) => Ok(Some((Self::read(&path)?, path))),
            None => Ok(None),
        }
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DISTMIRROR_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("distmirror/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".distmirror/config.toml");
        path.exists().then_some(path)
    }

    /// Read and parse a config file.
    pub fn read(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Identity used for import commits and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

/// HTTP basic credentials for origin downloads and https remotes.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where upstream content comes from, decided by the shape of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// A dist-git repository URL
    Git { url: String },
    /// A local source RPM
    File { path: PathBuf },
}

/// Immutable settings for one import run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Package (or module) name
    pub package: String,
    pub source: SourceInput,
    pub upstream_prefix: String,
    pub version: u32,
    pub storage_addr: String,
    pub ssh_key_location: Option<PathBuf>,
    pub ssh_user: String,
    pub committer: Committer,
    pub module_prefix: String,
    pub rpm_prefix: String,
    pub import_branch_prefix: String,
    pub branch_prefix: String,
    pub branch_suffix: Option<String>,
    pub strict_branch_mode: bool,
    /// Origin URL or template for lookaside downloads
    pub cdn_url: String,
    pub single_tag: Option<String>,
    pub no_dup_mode: bool,
    pub module_mode: bool,
    pub tmpfs_mode: Option<PathBuf>,
    pub no_storage_download: bool,
    pub no_storage_upload: bool,
    pub manual_commits: Vec<ManualCommit>,
    pub package_version: Option<String>,
    pub package_release: Option<String>,
    pub tagless_mode: bool,
    pub module_branch_names_only: bool,
    pub basic_auth: Option<BasicAuth>,
    pub patch_dir: String,
    pub resolver: Resolver,
}

impl RunConfig {
    /// Start building a config for `source_rpm` (a package name or a local
    /// `.rpm` path).
    pub fn builder(source_rpm: impl Into<String>) -> RunConfigBuilder {
        RunConfigBuilder::new(source_rpm)
    }

    /// The upstream location, as recorded in import tag messages.
    pub fn source_url(&self) -> String {
        match &self.source {
            SourceInput::Git { url } => url.clone(),
            SourceInput::File { path } => path.display().to_string(),
        }
    }

    /// Downstream repository kind for this run.
    pub fn repo_kind(&self) -> RepoKind {
        if self.module_mode {
            RepoKind::Modules
        } else {
            RepoKind::Rpms
        }
    }

    /// Downstream repository URL for this run.
    pub fn downstream_url(&self) -> String {
        repo_url(&self.upstream_prefix, self.repo_kind(), &self.package)
    }

    /// Patch repository URL for this run.
    pub fn patch_repo_url(&self) -> String {
        repo_url(&self.upstream_prefix, RepoKind::Patch, &self.package)
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    source_rpm: String,
    file: ConfigFile,
    single_tag: Option<String>,
    manual_commits: Option<String>,
    package_version: Option<String>,
    package_release: Option<String>,
}

impl RunConfigBuilder {
    fn new(source_rpm: impl Into<String>) -> Self {
        Self {
            source_rpm: source_rpm.into(),
            file: ConfigFile::default(),
            single_tag: None,
            manual_commits: None,
            package_version: None,
            package_release: None,
        }
    }

    /// Layer file or flag values on top of what is already set.
    pub fn apply(mut self, values: &ConfigFile) -> Self {
        self.file = std::mem::take(&mut self.file).merge(values.clone());
        self
    }

    /// Import only this tag (without `refs/tags/`).
    pub fn single_tag(mut self, tag: impl Into<String>) -> Self {
        self.single_tag = Some(tag.into());
        self
    }

    /// Comma separated `BRANCH:HASH` pins.
    pub fn manual_commits(mut self, pins: impl Into<String>) -> Self {
        self.manual_commits = Some(pins.into());
        self
    }

    /// Only import this package version.
    pub fn package_version(mut self, version: impl Into<String>) -> Self {
        self.package_version = Some(version.into());
        self
    }

    /// Only import this package release.
    pub fn package_release(mut self, release: impl Into<String>) -> Self {
        self.package_release = Some(release.into());
        self
    }

    /// Apply defaults, validate, and compile the import pattern.
    ///
    /// # Errors
    ///
    /// - Empty package or non-positive version
    /// - Missing or unsupported storage address
    /// - Malformed manual commit pins
    /// - Unknown named CDN
    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let f = self.file;

        let source_rpm = self.source_rpm.trim().to_string();
        if source_rpm.is_empty() {
            return Err(ConfigError::InvalidValue("package cannot be empty".into()));
        }

        let version = f.version.unwrap_or(DEFAULT_VERSION);
        if version == 0 {
            return Err(ConfigError::InvalidValue(
                "version must be a positive number".into(),
            ));
        }

        let storage_addr = f.storage_addr.ok_or(ConfigError::Missing("storage-addr"))?;
        StorageAddr::parse(&storage_addr).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let module_mode = f.module_mode.unwrap_or(false);
        let module_prefix = f
            .module_prefix
            .unwrap_or_else(|| DEFAULT_MODULE_PREFIX.to_string());
        let rpm_prefix = f.rpm_prefix.unwrap_or_else(|| DEFAULT_RPM_PREFIX.to_string());

        let (package, source) = classify_source(&source_rpm, module_mode, &module_prefix, &rpm_prefix)?;

        let manual_commits = match &self.manual_commits {
            Some(list) => ManualCommit::parse_list(list)
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?,
            None => Vec::new(),
        };

        let cdn_url = match f.cdn.as_deref() {
            Some(name) => cdn::named_template(name)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(format!(
                        "unknown cdn '{name}' (valid: {})",
                        cdn::NAMED_TEMPLATES
                            .iter()
                            .map(|(n, _)| *n)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })?
                .to_string(),
            None => f.cdn_url.unwrap_or_else(|| cdn::DEFAULT_CDN_URL.to_string()),
        };

        let basic_auth = match (f.basic_username, f.basic_password) {
            (Some(username), password) => Some(BasicAuth {
                username,
                password: password.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(ConfigError::InvalidValue(
                    "basic-password requires basic-username".into(),
                ))
            }
            (None, None) => None,
        };

        let import_branch_prefix = f
            .import_branch_prefix
            .unwrap_or_else(|| DEFAULT_IMPORT_BRANCH_PREFIX.to_string());
        let branch_prefix = f
            .branch_prefix
            .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string());
        let branch_suffix = f.branch_suffix.filter(|s| !s.is_empty());
        let strict_branch_mode = f.strict_branch_mode.unwrap_or(false);
        let tagless_mode = f.tagless_mode.unwrap_or(false);
        let package_version = self.package_version.filter(|s| !s.is_empty());
        let package_release = self.package_release.filter(|s| !s.is_empty());

        let resolver = Resolver::new(ResolverSettings {
            package: package.clone(),
            version,
            import_branch_prefix: import_branch_prefix.clone(),
            branch_prefix: branch_prefix.clone(),
            branch_suffix: branch_suffix.clone(),
            strict_branch_mode,
            module_mode,
            tagless_mode,
            package_version: package_version.clone(),
            package_release: package_release.clone(),
        })
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(RunConfig {
            package,
            source,
            upstream_prefix: f
                .upstream_prefix
                .unwrap_or_else(|| DEFAULT_UPSTREAM_PREFIX.to_string())
                .trim_end_matches('/')
                .to_string(),
            version,
            storage_addr,
            ssh_key_location: f.ssh_key_location,
            ssh_user: f.ssh_user.unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
            committer: Committer {
                name: f
                    .git_committer_name
                    .unwrap_or_else(|| DEFAULT_COMMITTER_NAME.to_string()),
                email: f
                    .git_committer_email
                    .unwrap_or_else(|| DEFAULT_COMMITTER_EMAIL.to_string()),
            },
            module_prefix,
            rpm_prefix,
            import_branch_prefix,
            branch_prefix,
            branch_suffix,
            strict_branch_mode,
            cdn_url,
            single_tag: self.single_tag.filter(|s| !s.is_empty()),
            no_dup_mode: f.no_dup_mode.unwrap_or(false),
            module_mode,
            tmpfs_mode: f.tmpfs_mode,
            no_storage_download: f.no_storage_download.unwrap_or(false),
            no_storage_upload: f.no_storage_upload.unwrap_or(false),
            manual_commits,
            package_version,
            package_release,
            tagless_mode,
            module_branch_names_only: f.module_branch_names_only.unwrap_or(false),
            basic_auth,
            patch_dir: f.patch_dir.unwrap_or_else(|| DEFAULT_PATCH_DIR.to_string()),
            resolver,
        })
    }
}

/// Decide between file mode and git mode.
///
/// An existing local file ending in `.rpm` selects file mode; its package
/// name is taken from the file name. Anything else is a package name
/// looked up under the rpm (or module) prefix.
fn classify_source(
    source_rpm: &str,
    module_mode: bool,
    module_prefix: &str,
    rpm_prefix: &str,
) -> Result<(String, SourceInput), ConfigError> {
    let path = Path::new(source_rpm);
    if source_rpm.ends_with(".rpm") && path.is_file() {
        if module_mode {
            return Err(ConfigError::InvalidValue(
                "module mode cannot import a source rpm file".into(),
            ));
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(source_rpm);
        let nvr = Nvr::parse(file_name).ok_or_else(|| {
            ConfigError::InvalidValue(format!("cannot derive package name from '{file_name}'"))
        })?;
        return Ok((
            nvr.name,
            SourceInput::File {
                path: path.to_path_buf(),
            },
        ));
    }

    let prefix = if module_mode { module_prefix } else { rpm_prefix };
    Ok((
        source_rpm.to_string(),
        SourceInput::Git {
            url: format!("{}/{}", prefix.trim_end_matches('/'), source_rpm),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_storage() -> ConfigFile {
        ConfigFile {
            storage_addr: Some("memory://".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let config = RunConfig::builder("httpd").apply(&with_storage()).build().unwrap();

        assert_eq!(config.version, 8);
        assert_eq!(config.upstream_prefix, DEFAULT_UPSTREAM_PREFIX);
        assert_eq!(config.ssh_user, "git");
        assert_eq!(config.committer.name, "rockyautomation");
        assert_eq!(config.committer.email, "rockyautomation@rockylinux.org");
        assert_eq!(config.import_branch_prefix, "c");
        assert_eq!(config.branch_prefix, "r");
        assert_eq!(config.cdn_url, "https://git.centos.org/sources");
        assert_eq!(config.patch_dir, "ROCKY");
        assert!(!config.no_dup_mode);
        assert!(config.manual_commits.is_empty());
        assert_eq!(
            config.source,
            SourceInput::Git {
                url: "https://git.centos.org/rpms/httpd".into()
            }
        );
        assert_eq!(
            config.downstream_url(),
            "https://git.rockylinux.org/staging/rpms/httpd.git"
        );
        assert_eq!(
            config.patch_repo_url(),
            "https://git.rockylinux.org/staging/patch/httpd.git"
        );
    }

    #[test]
    fn module_mode_uses_module_prefix() {
        let config = RunConfig::builder("nodejs")
            .apply(&ConfigFile {
                module_mode: Some(true),
                ..with_storage()
            })
            .build()
            .unwrap();
        assert_eq!(config.source_url(), "https://git.centos.org/modules/nodejs");
        assert_eq!(config.repo_kind(), RepoKind::Modules);
    }

    #[test]
    fn storage_is_required_and_validated() {
        assert!(matches!(
            RunConfig::builder("bash").build(),
            Err(ConfigError::Missing("storage-addr"))
        ));
        let result = RunConfig::builder("bash")
            .apply(&ConfigFile {
                storage_addr: Some("ftp://x".into()),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn rejects_empty_package_and_zero_version() {
        assert!(RunConfig::builder("  ").apply(&with_storage()).build().is_err());
        let result = RunConfig::builder("bash")
            .apply(&ConfigFile {
                version: Some(0),
                ..with_storage()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn manual_commits_are_parsed() {
        let hash = "a".repeat(40);
        let config = RunConfig::builder("bash")
            .apply(&with_storage())
            .manual_commits(format!("c8:{hash}"))
            .build()
            .unwrap();
        assert_eq!(config.manual_commits.len(), 1);

        let result = RunConfig::builder("bash")
            .apply(&with_storage())
            .manual_commits("c8")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn named_cdn_overrides_url() {
        let config = RunConfig::builder("bash")
            .apply(&ConfigFile {
                cdn_url: Some("https://example.org/x".into()),
                cdn: Some("fedora".into()),
                ..with_storage()
            })
            .build()
            .unwrap();
        assert!(config.cdn_url.contains("fedoraproject"));

        let result = RunConfig::builder("bash")
            .apply(&ConfigFile {
                cdn: Some("nowhere".into()),
                ..with_storage()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn basic_password_requires_username() {
        let result = RunConfig::builder("bash")
            .apply(&ConfigFile {
                basic_password: Some("secret".into()),
                ..with_storage()
            })
            .build();
        assert!(result.is_err());

        let config = RunConfig::builder("bash")
            .apply(&ConfigFile {
                basic_username: Some("user".into()),
                basic_password: Some("secret".into()),
                ..with_storage()
            })
            .build()
            .unwrap();
        let auth = config.basic_auth.unwrap();
        assert!(!format!("{auth:?}").contains("secret"));
    }

    #[test]
    fn local_rpm_selects_file_mode() {
        let temp = TempDir::new().unwrap();
        let rpm = temp.path().join("httpd-2.4.37-21.el8.src.rpm");
        fs::write(&rpm, b"").unwrap();

        let config = RunConfig::builder(rpm.to_str().unwrap())
            .apply(&with_storage())
            .build()
            .unwrap();
        assert_eq!(config.package, "httpd");
        assert_eq!(config.source, SourceInput::File { path: rpm });
    }

    #[test]
    fn missing_rpm_file_is_treated_as_name() {
        let config = RunConfig::builder("does-not-exist.rpm")
            .apply(&with_storage())
            .build()
            .unwrap();
        assert!(matches!(config.source, SourceInput::Git { .. }));
    }

    #[test]
    fn flags_override_file() {
        let file = ConfigFile {
            version: Some(9),
            branch_prefix: Some("x".into()),
            ..with_storage()
        };
        let flags = ConfigFile {
            version: Some(10),
            ..Default::default()
        };
        let config = RunConfig::builder("bash")
            .apply(&file)
            .apply(&flags)
            .build()
            .unwrap();
        assert_eq!(config.version, 10);
        assert_eq!(config.branch_prefix, "x");
    }

    #[test]
    fn load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "version = 9\nno_dup_mode = true\n").unwrap();

        let (file, from) = ConfigFile::load(Some(&path)).unwrap().unwrap();
        assert_eq!(from, path);
        assert_eq!(file.version, Some(9));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let result = ConfigFile::load(Some(&temp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "version = 8\nunknown_field = true\n").unwrap();

        assert!(matches!(
            ConfigFile::read(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn load_from_env() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("env.toml");
        fs::write(&path, "ssh_user = \"mirror\"\n").unwrap();

        std::env::set_var("DISTMIRROR_CONFIG", &path);
        let loaded = ConfigFile::load(None).unwrap();
        std::env::remove_var("DISTMIRROR_CONFIG");

        let (file, from) = loaded.unwrap();
        assert_eq!(from, path);
        assert_eq!(file.ssh_user.as_deref(), Some("mirror"));
    }
}
