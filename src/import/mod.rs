//! import
//!
//! Importers discover upstream refs and materialize upstream content for
//! one ref at a time into a staging tree.
//!
//! # Architecture
//!
//! [`Importer`] is the capability the publish pipeline drives. Two
//! implementations exist and are selected by the shape of the input (see
//! [`create_importer`]):
//!
//! - [`GitImporter`] - an upstream dist-git repository
//! - [`SrpmImporter`] - a local source RPM
//!
//! The staging tree is owned by the importer and reset for every ref; the
//! pipeline copies it into a fresh destination repository.

mod git_mode;
mod payload;
mod probe;
mod srpm_mode;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub use git_mode::GitImporter;
pub use probe::{RpmspecProbe, VersionProbe};
pub use srpm_mode::SrpmImporter;

use crate::core::config::{RunConfig, SourceInput};
use crate::core::tree;
use crate::core::types::Oid;
use crate::engine::ImportError;
use crate::git::{Git, GitAuth};
use crate::lookaside::{BlobManager, LookasideList};
use crate::resolve::ResolvedRef;

/// A package (or module) and the refs found upstream for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePackage {
    /// Package or module name
    pub name: String,
    /// Candidate upstream refs in import order
    pub refs: Vec<String>,
    /// Staging tree the importer writes each ref into
    pub tree: PathBuf,
}

/// Per-branch working state.
///
/// Created fresh for every ref and dropped once the branch is published.
#[derive(Debug)]
pub struct BranchContext {
    /// The upstream ref being imported
    pub upstream_ref: String,
    pub resolved: ResolvedRef,
    /// Commit to check out instead of the ref itself
    pub pin: Option<Oid>,
    /// Staging tree holding the upstream content
    pub tree: PathBuf,
    /// Pending lookaside entries
    pub lookaside: LookasideList,
    /// NVR derived from the spec file (tagless mode)
    pub probed_nvr: Option<String>,
}

impl BranchContext {
    pub fn new(
        upstream_ref: impl Into<String>,
        resolved: ResolvedRef,
        pin: Option<Oid>,
        tree: impl Into<PathBuf>,
        lookaside: LookasideList,
    ) -> Self {
        Self {
            upstream_ref: upstream_ref.into(),
            resolved,
            pin,
            tree: tree.into(),
            lookaside,
            probed_nvr: None,
        }
    }

    /// The upstream branch the ref belongs to (`c8` for
    /// `refs/tags/imports/c8/bash-4.4.20-1.el8`).
    pub fn upstream_branch(&self) -> &str {
        upstream_branch(&self.upstream_ref)
    }
}

/// Upstream branch named by a head or import tag ref.
pub fn upstream_branch(upstream_ref: &str) -> &str {
    if let Some(head) = upstream_ref.strip_prefix("refs/heads/") {
        return head;
    }
    let rest = upstream_ref
        .strip_prefix("refs/tags/imports/")
        .unwrap_or(upstream_ref);
    rest.split('/').next().unwrap_or(rest)
}

/// Source of upstream content.
pub trait Importer {
    /// Prepare the staging tree and list candidate refs.
    fn retrieve_source(&mut self, config: &RunConfig) -> Result<SourcePackage, ImportError>;

    /// Populate the staging tree for `ctx`'s ref.
    ///
    /// Lookaside sources are retrieved through `blobs` and re-tracked in
    /// `ctx.lookaside`, which clears their expired flag.
    fn write_source(
        &mut self,
        config: &RunConfig,
        ctx: &mut BranchContext,
        blobs: &mut BlobManager,
    ) -> Result<(), ImportError>;

    /// Final cleanup of the destination tree before commit.
    fn post_process(&self, ctx: &BranchContext, dest: &Git) -> Result<(), ImportError>;

    /// Subject used in the import commit message.
    fn import_name(&self, config: &RunConfig, ctx: &BranchContext) -> String;
}

/// Select an importer by the shape of the input.
pub fn create_importer(config: &RunConfig) -> Result<Box<dyn Importer>, ImportError> {
    match &config.source {
        SourceInput::Git { url } => Ok(Box::new(GitImporter::new(
            url.clone(),
            GitAuth::from_config(config),
            Box::new(RpmspecProbe),
        )?)),
        SourceInput::File { path } => Ok(Box::new(SrpmImporter::new(path.clone())?)),
    }
}

/// Remove lookaside files from the destination tree and stage everything.
///
/// Lookaside blobs are published through the metadata file, never
/// committed.
pub(crate) fn drop_lookaside_and_stage(
    lookaside: &LookasideList,
    dest: &Git,
) -> Result<(), ImportError> {
    let root = dest.work_dir()?.to_path_buf();
    for entry in lookaside.iter() {
        let path = root.join(&entry.path);
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| ImportError::io(&path, e))?;
            debug!(path = %entry.path, "removed lookaside file from tree");
        }
    }
    dest.stage_all()?;
    Ok(())
}

/// Write `bytes` to `root/rel`, creating parent directories.
pub(crate) fn write_tree_file(root: &Path, rel: &str, bytes: &[u8]) -> Result<(), ImportError> {
    tree::write_file(root, rel, bytes).map_err(|e| ImportError::io(root.join(rel), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_branch_of_tag_and_head() {
        assert_eq!(
            upstream_branch("refs/tags/imports/c8/bash-4.4.20-1.el8"),
            "c8"
        );
        assert_eq!(
            upstream_branch("refs/tags/imports/c8-stream-1.1/bash-1-1.el8"),
            "c8-stream-1.1"
        );
        assert_eq!(upstream_branch("refs/heads/c8s-stream-rhel8"), "c8s-stream-rhel8");
    }

    #[test]
    fn drop_lookaside_removes_files_before_staging() {
        use crate::core::config::Committer;
        use crate::lookaside::HashAlgorithm;

        let dir = tempfile::TempDir::new().unwrap();
        let git = Git::init(dir.path()).unwrap();
        write_tree_file(dir.path(), "SOURCES/big.tar.gz", b"blob").unwrap();
        write_tree_file(dir.path(), "SPECS/x.spec", b"Name: x\n").unwrap();

        let mut lookaside = LookasideList::new();
        lookaside.track("SOURCES/big.tar.gz", HashAlgorithm::Sha256);
        drop_lookaside_and_stage(&lookaside, &git).unwrap();

        assert!(!dir.path().join("SOURCES/big.tar.gz").exists());
        assert_eq!(git.index_paths().unwrap(), vec!["SPECS/x.spec".to_string()]);
        git.commit(
            "import",
            &Committer {
                name: "t".into(),
                email: "t@example.com".into(),
            },
            None,
        )
        .unwrap();
    }
}
