//! engine::publish
//!
//! The per-branch commit and publish loop.
//!
//! # Per ref
//!
//! ```text
//! resolve -> [no-dup] -> write source -> checkout destination -> copy tree
//!   -> module metadata | patch directives -> metadata file + .gitignore
//!   -> [tmpfs stop] -> post process -> commit -> tag -> push
//! ```
//!
//! Refs that do not resolve and refs whose import tag already exists
//! downstream (no-dup mode) are skipped. Every other failure aborts the
//! run.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::ImportError;
use crate::core::config::RunConfig;
use crate::core::naming::https_prefix;
use crate::core::nvr::{changelog_version, BranchVersion, Nvr};
use crate::core::paths::{metadata_file_name, GITIGNORE, SPECS_DIR};
use crate::core::tree::copy_tree;
use crate::core::types::{BranchName, Oid};
use crate::git::{Git, GitAuth};
use crate::import::{BranchContext, Importer, SourcePackage};
use crate::lookaside::{ensure_gitignore, BlobManager, BlobOptions, LookasideList, OriginFetcher};
use crate::module::{patch_module_yaml, ModuleSettings, RemoteTipResolver, RetryPolicy, TipResolver};
use crate::patches::{PatchRepository, PatchTarget};
use crate::resolve::{RefPlan, Resolution, ResolvedRef};
use crate::storage::BlobStorage;

const DOWNSTREAM_REMOTE: &str = "origin";

/// Outcome of a run: what was published where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    /// Push branch -> commit hash
    pub branch_commits: BTreeMap<String, String>,
    /// Push branch -> version and release of the imported package
    pub branch_versions: BTreeMap<String, BranchVersion>,
}

impl PublishResult {
    pub fn is_empty(&self) -> bool {
        self.branch_commits.is_empty()
    }
}

/// Run-scoped mutable state shared by every branch iteration.
#[derive(Debug, Default)]
pub struct RunState {
    /// Lookaside entries; expired at the top of every iteration
    pub lookaside: LookasideList,
    /// `refs/tags/imports/...` already present downstream (no-dup mode)
    pub existing_tags: HashSet<String>,
    pub result: PublishResult,
}

impl RunState {
    fn is_duplicate(&self, new_tag: &str) -> bool {
        self.existing_tags.contains(&format!("refs/tags/{new_tag}"))
    }
}

/// The import pipeline with its collaborators.
pub struct Pipeline<'c> {
    config: &'c RunConfig,
    importer: Box<dyn Importer>,
    blobs: BlobManager,
    tips: Box<dyn TipResolver>,
    auth: GitAuth,
    today: NaiveDate,
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("package", &self.config.package)
            .field("downstream", &self.config.downstream_url())
            .field("today", &self.today)
            .finish()
    }
}

impl<'c> Pipeline<'c> {
    /// Wire a pipeline for `config`.
    ///
    /// Component tips are listed from the upstream prefix and git
    /// credentials come from the config; both can be replaced.
    pub fn new(
        config: &'c RunConfig,
        importer: Box<dyn Importer>,
        storage: Box<dyn BlobStorage>,
        fetcher: Box<dyn OriginFetcher>,
    ) -> Self {
        let auth = GitAuth::from_config(config);
        let blobs = BlobManager::new(
            storage,
            fetcher,
            BlobOptions {
                origin_template: config.cdn_url.clone(),
                no_download: config.no_storage_download,
                no_upload: config.no_storage_upload,
            },
        );
        Self {
            config,
            importer,
            blobs,
            tips: Box::new(RemoteTipResolver::new(&config.upstream_prefix, auth.clone())),
            auth,
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn with_tip_resolver(mut self, tips: Box<dyn TipResolver>) -> Self {
        self.tips = tips;
        self
    }

    pub fn with_auth(mut self, auth: GitAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Date used for synthesized changelog stanzas.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Import every selected ref.
    ///
    /// # Errors
    ///
    /// Any failure other than a resolver skip or a no-dup skip aborts the
    /// run. Directive failures arrive as [`ImportError::Directives`].
    pub fn run(mut self) -> Result<PublishResult, ImportError> {
        let config = self.config;
        let source = self.importer.retrieve_source(config)?;
        info!(package = %source.name, refs = source.refs.len(), "retrieved source");

        let mut state = RunState {
            existing_tags: self.existing_tags(),
            ..Default::default()
        };

        let plan = RefPlan::select(
            &source.name,
            source.refs.clone(),
            config.single_tag.as_deref(),
            &config.manual_commits,
        );

        let patches = if config.module_mode {
            PatchRepository::absent(&config.patch_dir)?
        } else {
            PatchRepository::fetch(&config.patch_repo_url(), &config.patch_dir, &self.auth)?
        };

        for upstream_ref in &plan.refs {
            self.import_ref(&mut state, &source, &plan, &patches, upstream_ref)?;
        }

        info!(branches = state.result.branch_commits.len(), "run finished");
        Ok(state.result)
    }

    /// Import tags already downstream, or nothing when no-dup mode is off.
    fn existing_tags(&self) -> HashSet<String> {
        if !self.config.no_dup_mode {
            return HashSet::new();
        }

        let url = self.config.downstream_url();
        match Git::list_remote(&url, &self.auth) {
            Ok(refs) => refs
                .into_iter()
                .map(|r| r.name.as_str().to_string())
                .filter(|name| name.starts_with("refs/tags/imports"))
                .collect(),
            Err(e) => {
                warn!(url = %url, error = %e, "could not list downstream refs, ignoring no-dup mode");
                HashSet::new()
            }
        }
    }

    fn import_ref(
        &mut self,
        state: &mut RunState,
        source: &SourcePackage,
        plan: &RefPlan,
        patches: &PatchRepository,
        upstream_ref: &str,
    ) -> Result<(), ImportError> {
        let config = self.config;
        let resolved = match plan.resolve(&config.resolver, upstream_ref) {
            Resolution::Import(resolved) => resolved,
            Resolution::Skip(reason) => {
                info!(upstream_ref, %reason, "skipping ref");
                return Ok(());
            }
        };

        if !config.tagless_mode && self.skip_duplicate(state, &resolved) {
            return Ok(());
        }

        state.lookaside.expire_all();
        let mut ctx = BranchContext::new(
            upstream_ref,
            resolved,
            plan.pin_for(upstream_ref).cloned(),
            &source.tree,
            std::mem::take(&mut state.lookaside),
        );

        let outcome = self.publish_branch(state, patches, &mut ctx);
        state.lookaside = std::mem::take(&mut ctx.lookaside);
        outcome
    }

    fn skip_duplicate(&self, state: &RunState, resolved: &ResolvedRef) -> bool {
        if self.config.no_dup_mode && state.is_duplicate(&resolved.new_tag) {
            info!(tag = %resolved.new_tag, "already imported, skipping");
            return true;
        }
        false
    }

    fn publish_branch(
        &mut self,
        state: &mut RunState,
        patches: &PatchRepository,
        ctx: &mut BranchContext,
    ) -> Result<(), ImportError> {
        let config = self.config;
        self.importer.write_source(config, ctx, &mut self.blobs)?;

        if config.tagless_mode {
            if let Some(nvr) = &ctx.probed_nvr {
                ctx.resolved.new_tag = config.resolver.tagless_tag(&ctx.resolved.push_branch, nvr);
            }
            if self.skip_duplicate(state, &ctx.resolved) {
                return Ok(());
            }
        }

        let push_branch = ctx.resolved.push_branch.clone();
        info!(
            upstream_ref = %ctx.upstream_ref,
            push_branch = %push_branch,
            tag = %ctx.resolved.new_tag,
            "importing"
        );

        let dest = Destination::checkout(config, &push_branch, &self.auth)?;
        let tree = dest.path().to_path_buf();
        copy_tree(&ctx.tree, &tree).map_err(|e| ImportError::io(&ctx.tree, e))?;

        let import_name = self.importer.import_name(config, ctx);
        if config.module_mode {
            let settings = ModuleSettings {
                module: config.package.clone(),
                branch_prefix: config.branch_prefix.clone(),
                version: config.version,
                push_branch: push_branch.as_str().to_string(),
                https_prefix: https_prefix(&config.upstream_prefix),
                branch_names_only: config.module_branch_names_only,
                retry: RetryPolicy::default(),
            };
            patch_module_yaml(&tree, &settings, self.tips.as_ref(), &dest.git)?;
        } else {
            let mut target = PatchTarget {
                tree: &tree,
                git: &dest.git,
                lookaside: &mut ctx.lookaside,
                changelog_version: changelog_version(&import_name, &config.package),
                today: self.today,
            };
            let applied = patches.apply(push_branch.as_str(), &mut target)?;
            debug!(applied, "applied directive files");
        }

        self.write_metadata(&tree, &ctx.lookaside, &dest.git)?;

        if config.tmpfs_mode.is_some() {
            info!(path = %tree.display(), "staged for inspection, not publishing");
            return Ok(());
        }

        self.importer.post_process(ctx, &dest.git)?;
        for path in dest.git.deleted_paths()? {
            debug!(path = %path, "removing deleted file from index");
            dest.git.remove_path(&path)?;
        }

        let commit = dest.git.commit(
            &format!("import {import_name}"),
            &config.committer,
            dest.parent.as_ref(),
        )?;
        info!(commit = %commit, branch = %push_branch, "committed");

        dest.git.create_annotated_tag(
            &ctx.resolved.new_tag,
            &commit,
            &config.committer,
            &format!("import {} from {}", ctx.upstream_ref, config.source_url()),
        )?;

        let refspecs = dest.push_refspecs(&push_branch, &ctx.resolved.new_tag);
        dest.git.push(DOWNSTREAM_REMOTE, &refspecs, &self.auth)?;
        info!(branch = %push_branch, tag = %ctx.resolved.new_tag, "pushed");

        state
            .result
            .branch_commits
            .insert(push_branch.as_str().to_string(), commit.as_str().to_string());
        if let Some(nvr) = Nvr::parse(&import_name) {
            state
                .result
                .branch_versions
                .insert(push_branch.as_str().to_string(), nvr.branch_version());
        }
        Ok(())
    }

    /// Regenerate the metadata file and stage it with `.gitignore` and
    /// `SPECS`.
    fn write_metadata(
        &mut self,
        tree: &Path,
        lookaside: &LookasideList,
        git: &Git,
    ) -> Result<(), ImportError> {
        let package = &self.config.package;
        let lines = self.blobs.publish(tree, package, lookaside)?;
        ensure_gitignore(tree, lines.iter().map(|l| l.path.as_str()))?;
        info!(entries = lines.len(), "wrote lookaside metadata");

        git.stage_path(&metadata_file_name(package))?;
        for path in [GITIGNORE, SPECS_DIR] {
            if tree.join(path).exists() {
                git.stage_path(path)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Destination Worktree
// =============================================================================

/// Fresh destination repository for one push branch.
struct Destination {
    /// Kept alive for the temporary worktree; `None` in tmpfs mode
    _workdir: Option<TempDir>,
    path: PathBuf,
    git: Git,
    /// Previous tip of the push branch, `None` for a new branch
    parent: Option<Oid>,
}

impl Destination {
    /// Create the worktree and check out the existing push branch, or start
    /// an unborn one when the branch (or repository) does not exist yet.
    fn checkout(
        config: &RunConfig,
        push_branch: &BranchName,
        auth: &GitAuth,
    ) -> Result<Self, ImportError> {
        let (workdir, path) = match &config.tmpfs_mode {
            Some(root) => {
                let path = root.join(push_branch.as_str());
                if path.exists() {
                    fs::remove_dir_all(&path).map_err(|e| ImportError::io(&path, e))?;
                }
                fs::create_dir_all(&path).map_err(|e| ImportError::io(&path, e))?;
                (None, path)
            }
            None => {
                let dir = TempDir::new().map_err(|e| ImportError::io(std::env::temp_dir(), e))?;
                let path = dir.path().to_path_buf();
                (Some(dir), path)
            }
        };

        let git = Git::init(&path)?;
        let url = config.downstream_url();
        info!(remote = %url, "using remote");
        git.add_remote(DOWNSTREAM_REMOTE, &url)?;

        let refspec = format!(
            "+refs/heads/{push_branch}:refs/remotes/{DOWNSTREAM_REMOTE}/{push_branch}"
        );
        debug!(refspec = %refspec, "using refspec");
        let tip = match git.fetch(DOWNSTREAM_REMOTE, &[refspec.as_str()], auth) {
            Ok(()) => git.try_resolve_ref(&format!(
                "refs/remotes/{DOWNSTREAM_REMOTE}/{push_branch}"
            ))?,
            Err(e) => {
                debug!(error = %e, "downstream not reachable, starting a new branch");
                None
            }
        };

        match &tip {
            Some(oid) => {
                info!(branch = %push_branch, tip = %oid.short(12), "checked out existing branch");
                git.checkout_branch_at(push_branch, oid)?;
            }
            None => {
                info!(branch = %push_branch, "new branch");
                git.set_unborn_head(push_branch)?;
            }
        }

        Ok(Self {
            _workdir: workdir,
            path,
            git,
            parent: tip,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Force-push the branch and the import tag together.
    fn push_refspecs(&self, push_branch: &BranchName, tag: &str) -> Vec<String> {
        let branch = if self.parent.is_some() {
            format!("+refs/heads/{push_branch}:refs/heads/{push_branch}")
        } else {
            "+refs/heads/*:refs/heads/*".to_string()
        };
        vec![branch, format!("+refs/tags/{tag}:refs/tags/{tag}")]
    }
}
