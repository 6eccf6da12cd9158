//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version (top level only; `import --version` is the
//!   distribution version)
//! - `--config <path>`: Read defaults from this file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Warnings and errors only

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::ConfigFile;

/// distmirror - Mirror dist-git imports into a downstream forge
#[derive(Parser, Debug)]
#[command(name = "distmirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read defaults from this config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a package or module into the downstream forge
    #[command(
        name = "import",
        long_about = "Import a package or module into the downstream forge.\n\n\
            Every matching upstream import tag (or branch head, in module and \
            tagless mode) is assembled into a normalized SPECS/SOURCES tree, \
            patched from the package's patch repository, committed, tagged and \
            pushed. Large sources are moved to blob storage and listed in the \
            .<name>.metadata file.\n\n\
            On success a JSON report mapping push branches to commits and \
            versions is printed on stdout.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Import every c8 tag of httpd
    distmirror import --source-rpm httpd --storage-addr file:///srv/lookaside

    # Import a single tag, skipping tags already pushed
    distmirror import --source-rpm bash --single-tag imports/c8/bash-4.4.20-1.el8 \\
        --storage-addr file:///srv/lookaside --no-dup-mode

    # Import a local source rpm and inspect the result without pushing
    distmirror import --source-rpm ./bash-4.4.20-1.el8.src.rpm \\
        --storage-addr file:///srv/lookaside --tmpfs-mode /tmp/staged"
    )]
    Import(Box<ImportArgs>),

    /// Download lookaside sources of a checked out package
    #[command(
        name = "fetch",
        long_about = "Download lookaside sources of a checked out package.\n\n\
            Reads the single *.metadata file under --path and downloads each \
            listed digest from <cdn-url>/<digest>, verifying it before writing \
            it to the listed path."
    )]
    Fetch {
        /// Base URL blobs are downloaded from
        #[arg(long)]
        cdn_url: String,

        /// Package checkout to populate
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    distmirror completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    distmirror completion zsh >> ~/.zshrc

    # Fish
    distmirror completion fish > ~/.config/fish/completions/distmirror.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags of `distmirror import`.
///
/// Every setting is optional here so that the config file can supply it;
/// boolean switches only override the file when given.
#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// Package name, module name, or path to a local .src.rpm
    #[arg(long)]
    pub source_rpm: String,

    /// Downstream repository prefix
    #[arg(long)]
    pub upstream_prefix: Option<String>,

    /// Distribution major version
    #[arg(long = "version")]
    pub version: Option<u32>,

    /// Blob storage address (file://, memory://)
    #[arg(long)]
    pub storage_addr: Option<String>,

    /// SSH private key for git remotes (ssh agent when unset)
    #[arg(long)]
    pub ssh_key_location: Option<PathBuf>,

    /// SSH user for git remotes
    #[arg(long)]
    pub ssh_user: Option<String>,

    /// Name on import commits and tags
    #[arg(long)]
    pub git_committer_name: Option<String>,

    /// Email on import commits and tags
    #[arg(long)]
    pub git_committer_email: Option<String>,

    /// Where modules are retrieved from
    #[arg(long)]
    pub module_prefix: Option<String>,

    /// Where packages are retrieved from
    #[arg(long)]
    pub rpm_prefix: Option<String>,

    /// Upstream branch prefix
    #[arg(long)]
    pub import_branch_prefix: Option<String>,

    /// Downstream branch prefix (replaces the import branch prefix)
    #[arg(long)]
    pub branch_prefix: Option<String>,

    /// Suffix of imported branches
    #[arg(long)]
    pub branch_suffix: Option<String>,

    /// Only import branches with exactly the computed name
    #[arg(long)]
    pub strict_branch_mode: bool,

    /// Origin URL for blobs; may contain {name} {branch} {hash} {hashtype} {filename}
    #[arg(long)]
    pub cdn_url: Option<String>,

    /// Named origin (centos, centos-stream, fedora, rocky, rocky8); overrides --cdn-url
    #[arg(long)]
    pub cdn: Option<String>,

    /// Import only this tag (without refs/tags/)
    #[arg(long)]
    pub single_tag: Option<String>,

    /// Skip tags already present downstream
    #[arg(long)]
    pub no_dup_mode: bool,

    /// Import a module instead of a package
    #[arg(long)]
    pub module_mode: bool,

    /// Assemble and patch into this directory without committing or pushing
    #[arg(long, value_name = "PATH")]
    pub tmpfs_mode: Option<PathBuf>,

    /// Always download blobs from the origin
    #[arg(long)]
    pub no_storage_download: bool,

    /// Never upload blobs to storage
    #[arg(long)]
    pub no_storage_upload: bool,

    /// Comma separated BRANCH:HASH pins for packages with broken release tags
    #[arg(long)]
    pub manual_commits: Option<String>,

    /// Only import this package version
    #[arg(long)]
    pub package_version: Option<String>,

    /// Only import this package release
    #[arg(long)]
    pub package_release: Option<String>,

    /// Import branch heads and derive the version from the spec file
    #[arg(long = "taglessmode")]
    pub tagless_mode: bool,

    /// Module components reference branch names instead of commit hashes
    #[arg(long)]
    pub module_branch_names_only: bool,

    /// Basic auth username for origin downloads and https remotes
    #[arg(long)]
    pub basic_username: Option<String>,

    /// Basic auth password (prompted when a username is given without one)
    #[arg(long)]
    pub basic_password: Option<String>,
}

fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

impl ImportArgs {
    /// The config-file shaped subset of these flags.
    pub fn config_overrides(&self) -> ConfigFile {
        ConfigFile {
            upstream_prefix: self.upstream_prefix.clone(),
            version: self.version,
            storage_addr: self.storage_addr.clone(),
            ssh_key_location: self.ssh_key_location.clone(),
            ssh_user: self.ssh_user.clone(),
            git_committer_name: self.git_committer_name.clone(),
            git_committer_email: self.git_committer_email.clone(),
            module_prefix: self.module_prefix.clone(),
            rpm_prefix: self.rpm_prefix.clone(),
            import_branch_prefix: self.import_branch_prefix.clone(),
            branch_prefix: self.branch_prefix.clone(),
            branch_suffix: self.branch_suffix.clone(),
            strict_branch_mode: flag(self.strict_branch_mode),
            cdn_url: self.cdn_url.clone(),
            cdn: self.cdn.clone(),
            no_dup_mode: flag(self.no_dup_mode),
            module_mode: flag(self.module_mode),
            tmpfs_mode: self.tmpfs_mode.clone(),
            no_storage_download: flag(self.no_storage_download),
            no_storage_upload: flag(self.no_storage_upload),
            tagless_mode: flag(self.tagless_mode),
            module_branch_names_only: flag(self.module_branch_names_only),
            basic_username: self.basic_username.clone(),
            basic_password: self.basic_password.clone(),
            patch_dir: None,
        }
    }
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
