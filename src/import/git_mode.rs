//! import::git_mode
//!
//! Import from an upstream dist-git repository.
//!
//! The upstream is fetched once into a local repository whose working
//! directory is the staging tree. Import tags are ordered by tagger time;
//! when there are none, branch heads are offered instead (module
//! repositories and tagless imports only have branches).
//!
//! For each ref the staging tree is force-checked-out (untracked and
//! ignored files removed), then every blob listed in the metadata file is
//! retrieved, verified and written into place.

use std::fs;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::probe::VersionProbe;
use super::{drop_lookaside_and_stage, write_tree_file, BranchContext, Importer, SourcePackage};
use crate::core::config::RunConfig;
use crate::core::paths::SPECS_DIR;
use crate::engine::ImportError;
use crate::git::{Git, GitAuth, TimedRef};
use crate::lookaside::cdn::OriginRequest;
use crate::lookaside::metadata::{self, find_metadata_file};
use crate::lookaside::{BlobManager, HashAlgorithm, LookasideError};

const UPSTREAM_REMOTE: &str = "upstream";

/// Importer for a dist-git repository URL.
pub struct GitImporter {
    url: String,
    auth: GitAuth,
    probe: Box<dyn VersionProbe>,
    workdir: TempDir,
    git: Option<Git>,
}

impl std::fmt::Debug for GitImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitImporter")
            .field("url", &self.url)
            .field("workdir", &self.workdir.path())
            .finish()
    }
}

impl GitImporter {
    pub fn new(
        url: impl Into<String>,
        auth: GitAuth,
        probe: Box<dyn VersionProbe>,
    ) -> Result<Self, ImportError> {
        let workdir = TempDir::new().map_err(|e| ImportError::io(std::env::temp_dir(), e))?;
        Ok(Self {
            url: url.into(),
            auth,
            probe,
            workdir,
            git: None,
        })
    }

    fn tree(&self) -> std::path::PathBuf {
        self.workdir.path().join("source")
    }

    fn git(&self) -> Result<&Git, ImportError> {
        self.git.as_ref().ok_or_else(|| {
            ImportError::InvalidInput("write_source called before retrieve_source".into())
        })
    }

    /// Retrieve every blob listed in the tree's metadata file.
    fn fetch_lookaside(
        &self,
        config: &RunConfig,
        ctx: &mut BranchContext,
        blobs: &mut BlobManager,
    ) -> Result<(), ImportError> {
        let Some(metadata_path) = find_metadata_file(&ctx.tree)? else {
            warn!(upstream_ref = %ctx.upstream_ref, "no metadata file, skipping lookaside");
            return Ok(());
        };

        let contents = fs::read_to_string(&metadata_path)
            .map_err(|e| ImportError::io(&metadata_path, e))?;
        let branch = ctx.upstream_branch().to_string();

        for line in metadata::parse(&contents)? {
            let algorithm = HashAlgorithm::from_digest(&line.digest).ok_or_else(|| {
                LookasideError::ChecksumMismatch {
                    digest: line.digest.clone(),
                    path: line.path.clone(),
                }
            })?;

            let bytes = blobs.retrieve(&OriginRequest {
                name: &config.package,
                branch: &branch,
                digest: &line.digest,
                path: &line.path,
            })?;
            write_tree_file(&ctx.tree, &line.path, &bytes)?;
            ctx.lookaside.track(line.path.clone(), algorithm);
        }
        Ok(())
    }
}

impl Importer for GitImporter {
    fn retrieve_source(&mut self, config: &RunConfig) -> Result<SourcePackage, ImportError> {
        let tree = self.tree();
        fs::create_dir_all(&tree).map_err(|e| ImportError::io(&tree, e))?;

        let git = Git::init(&tree)?;
        git.add_remote(UPSTREAM_REMOTE, &self.url)?;
        info!(url = %self.url, "fetching upstream");
        git.fetch(
            UPSTREAM_REMOTE,
            &[
                "+refs/heads/*:refs/remotes/upstream/*",
                "+refs/tags/*:refs/tags/*",
            ],
            &self.auth,
        )?;

        let import_prefix = format!(
            "refs/tags/imports/{}{}",
            config.import_branch_prefix, config.version
        );
        let mut refs: Vec<TimedRef> = git
            .list_refs_with_time("refs/tags/imports/*")?
            .into_iter()
            .filter(|r| r.name.as_str().starts_with(&import_prefix))
            .collect();

        if refs.is_empty() {
            debug!("no import tags upstream, using branch heads");
            refs = git
                .list_refs_with_time("refs/remotes/upstream/*")?
                .into_iter()
                .filter(|r| !r.name.as_str().ends_with("/HEAD"))
                .collect();
        }
        refs.sort_by_key(|r| r.time);

        let refs = refs
            .into_iter()
            .map(|r| match r.name.strip_prefix("refs/remotes/upstream/") {
                Some(branch) => format!("refs/heads/{branch}"),
                None => r.name.as_str().to_string(),
            })
            .collect::<Vec<_>>();
        info!(count = refs.len(), "discovered upstream refs");

        self.git = Some(git);
        Ok(SourcePackage {
            name: config.package.clone(),
            refs,
            tree,
        })
    }

    fn write_source(
        &mut self,
        config: &RunConfig,
        ctx: &mut BranchContext,
        blobs: &mut BlobManager,
    ) -> Result<(), ImportError> {
        let git = self.git()?;

        let commit = match &ctx.pin {
            Some(pin) => {
                if !git.has_commit(pin) {
                    return Err(ImportError::InvalidInput(format!(
                        "pinned commit {pin} not found upstream"
                    )));
                }
                pin.clone()
            }
            None => match ctx.upstream_ref.strip_prefix("refs/heads/") {
                Some(branch) => git.resolve_ref(&format!("refs/remotes/upstream/{branch}"))?,
                None => git.resolve_ref(&ctx.upstream_ref)?,
            },
        };
        info!(upstream_ref = %ctx.upstream_ref, commit = %commit.short(12), "checking out upstream");
        git.checkout_detached(&commit)?;

        self.fetch_lookaside(config, ctx, blobs)?;

        if config.tagless_mode {
            let spec = single_spec(&ctx.tree)?;
            let nvr = self.probe.probe(&ctx.tree, &spec)?;
            info!(nvr = %nvr, "derived nvr from spec");
            ctx.probed_nvr = Some(nvr);
        }
        Ok(())
    }

    fn post_process(&self, ctx: &BranchContext, dest: &Git) -> Result<(), ImportError> {
        drop_lookaside_and_stage(&ctx.lookaside, dest)
    }

    fn import_name(&self, _config: &RunConfig, ctx: &BranchContext) -> String {
        if let Some(nvr) = &ctx.probed_nvr {
            return nvr.clone();
        }
        match ctx.upstream_ref.strip_prefix("refs/heads/") {
            Some(branch) => branch.to_string(),
            None => ctx.resolved.nvr.clone(),
        }
    }
}

/// The single spec file under `SPECS/`.
pub(crate) fn single_spec(tree: &std::path::Path) -> Result<std::path::PathBuf, ImportError> {
    let specs_dir = tree.join(SPECS_DIR);
    let mut specs = Vec::new();
    if specs_dir.is_dir() {
        for entry in fs::read_dir(&specs_dir).map_err(|e| ImportError::io(&specs_dir, e))? {
            let path = entry.map_err(|e| ImportError::io(&specs_dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "spec") {
                specs.push(path);
            }
        }
    }
    match specs.len() {
        1 => Ok(specs.remove(0)),
        n => Err(ImportError::InvalidInput(format!(
            "expected exactly one spec file in {}, found {n}",
            specs_dir.display()
        ))),
    }
}
