//! core::config::schema
//!
//! Configuration file schema.
//!
//! # Location
//!
//! Searched in order:
//! 1. `--config <path>`
//! 2. `$DISTMIRROR_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/distmirror/config.toml`
//! 4. `~/.distmirror/config.toml`
//!
//! Every key mirrors the import flag of the same name (with `_` instead of
//! `-`). Keys that only make sense for a single run (`single_tag`,
//! `manual_commits`, `package_version`, `package_release`) are not
//! accepted here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Import defaults read from a TOML file.
///
/// # Example
///
/// ```toml
/// upstream_prefix = "ssh://git@git.example.org/staging"
/// storage_addr = "file:///srv/lookaside"
/// version = 9
/// branch_suffix = "s"
/// cdn = "centos-stream"
/// no_dup_mode = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub upstream_prefix: Option<String>,
    pub version: Option<u32>,
    pub storage_addr: Option<String>,
    pub ssh_key_location: Option<PathBuf>,
    pub ssh_user: Option<String>,
    pub git_committer_name: Option<String>,
    pub git_committer_email: Option<String>,
    pub module_prefix: Option<String>,
    pub rpm_prefix: Option<String>,
    pub import_branch_prefix: Option<String>,
    pub branch_prefix: Option<String>,
    pub branch_suffix: Option<String>,
    pub strict_branch_mode: Option<bool>,
    pub cdn_url: Option<String>,
    /// Named origin template; overrides `cdn_url`
    pub cdn: Option<String>,
    pub no_dup_mode: Option<bool>,
    pub module_mode: Option<bool>,
    /// Stage into this directory and stop before committing
    pub tmpfs_mode: Option<PathBuf>,
    pub no_storage_download: Option<bool>,
    pub no_storage_upload: Option<bool>,
    pub tagless_mode: Option<bool>,
    pub module_branch_names_only: Option<bool>,
    pub basic_username: Option<String>,
    pub basic_password: Option<String>,
    /// Directory in the patch repository holding `CFG/` and patch files
    pub patch_dir: Option<String>,
}

impl ConfigFile {
    /// Layer `over` on top of `self`; values set in `over` win.
    pub fn merge(self, over: ConfigFile) -> ConfigFile {
        ConfigFile {
            upstream_prefix: over.upstream_prefix.or(self.upstream_prefix),
            version: over.version.or(self.version),
            storage_addr: over.storage_addr.or(self.storage_addr),
            ssh_key_location: over.ssh_key_location.or(self.ssh_key_location),
            ssh_user: over.ssh_user.or(self.ssh_user),
            git_committer_name: over.git_committer_name.or(self.git_committer_name),
            git_committer_email: over.git_committer_email.or(self.git_committer_email),
            module_prefix: over.module_prefix.or(self.module_prefix),
            rpm_prefix: over.rpm_prefix.or(self.rpm_prefix),
            import_branch_prefix: over.import_branch_prefix.or(self.import_branch_prefix),
            branch_prefix: over.branch_prefix.or(self.branch_prefix),
            branch_suffix: over.branch_suffix.or(self.branch_suffix),
            strict_branch_mode: over.strict_branch_mode.or(self.strict_branch_mode),
            cdn_url: over.cdn_url.or(self.cdn_url),
            cdn: over.cdn.or(self.cdn),
            no_dup_mode: over.no_dup_mode.or(self.no_dup_mode),
            module_mode: over.module_mode.or(self.module_mode),
            tmpfs_mode: over.tmpfs_mode.or(self.tmpfs_mode),
            no_storage_download: over.no_storage_download.or(self.no_storage_download),
            no_storage_upload: over.no_storage_upload.or(self.no_storage_upload),
            tagless_mode: over.tagless_mode.or(self.tagless_mode),
            module_branch_names_only: over
                .module_branch_names_only
                .or(self.module_branch_names_only),
            basic_username: over.basic_username.or(self.basic_username),
            basic_password: over.basic_password.or(self.basic_password),
            patch_dir: over.patch_dir.or(self.patch_dir),
        }
    }
}
