//! patches
//!
//! Retrieval of the package's patch repository and application of the
//! directive files it carries.
//!
//! # Layout
//!
//! The patch repository lives next to the package repository
//! (`<upstream prefix>/patch/<name>.git`). Directive files are
//! `<patch dir>/CFG/*.cfg` and are applied in lexical order, first from
//! the `main` branch, then from the branch named after the push branch.
//! A missing repository or branch means there is nothing to apply.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::directives::{DirectiveContext, DirectiveError, DirectiveSet};
use crate::engine::ImportError;
use crate::git::{Git, GitAuth};
use crate::lookaside::LookasideList;

/// Branch whose directives apply to every push branch.
pub const COMMON_BRANCH: &str = "main";

const REMOTE: &str = "origin";

/// The push tree directives are applied to.
pub struct PatchTarget<'a> {
    pub tree: &'a Path,
    pub git: &'a Git,
    pub lookaside: &'a mut LookasideList,
    /// `<version>-<release>` for changelog stanzas
    pub changelog_version: Option<String>,
    pub today: NaiveDate,
}

/// A fetched patch repository.
pub struct PatchRepository {
    workdir: TempDir,
    /// `None` when the repository does not exist
    git: Option<Git>,
    patch_dir: String,
}

impl std::fmt::Debug for PatchRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchRepository")
            .field("workdir", &self.workdir.path())
            .field("present", &self.git.is_some())
            .field("patch_dir", &self.patch_dir)
            .finish()
    }
}

impl PatchRepository {
    /// Fetch every branch of the patch repository at `url`.
    ///
    /// A fetch failure is treated as "no patch repository".
    pub fn fetch(url: &str, patch_dir: &str, auth: &GitAuth) -> Result<Self, ImportError> {
        let workdir = TempDir::new().map_err(|e| ImportError::io(std::env::temp_dir(), e))?;
        let git = Git::init(workdir.path())?;
        git.add_remote(REMOTE, url)?;

        let git = match git.fetch(REMOTE, &["+refs/heads/*:refs/remotes/origin/*"], auth) {
            Ok(()) => {
                info!(url, "fetched patch repository");
                Some(git)
            }
            Err(e) => {
                info!(url, error = %e, "no patch repository");
                None
            }
        };

        Ok(Self {
            workdir,
            git,
            patch_dir: patch_dir.to_string(),
        })
    }

    /// A repository that carries no patches.
    pub fn absent(patch_dir: &str) -> Result<Self, ImportError> {
        let workdir = TempDir::new().map_err(|e| ImportError::io(std::env::temp_dir(), e))?;
        Ok(Self {
            workdir,
            git: None,
            patch_dir: patch_dir.to_string(),
        })
    }

    pub fn is_present(&self) -> bool {
        self.git.is_some()
    }

    /// Apply the common branch, then `push_branch`.
    ///
    /// Directive failures from every file are collected and returned
    /// together as [`ImportError::Directives`]. Returns the number of
    /// directive files applied.
    pub fn apply(&self, push_branch: &str, target: &mut PatchTarget<'_>) -> Result<usize, ImportError> {
        let Some(git) = &self.git else {
            return Ok(0);
        };

        let mut applied = 0;
        let mut errors: Vec<DirectiveError> = Vec::new();
        for branch in [COMMON_BRANCH, push_branch] {
            let remote_ref = format!("refs/remotes/{REMOTE}/{branch}");
            let Some(oid) = git.try_resolve_ref(&remote_ref)? else {
                debug!(branch, "patch branch not present");
                continue;
            };
            git.checkout_detached(&oid)?;

            for cfg in self.directive_files()? {
                let contents = fs::read_to_string(&cfg).map_err(|e| ImportError::io(&cfg, e))?;
                let set = DirectiveSet::parse(&contents).map_err(|e| {
                    ImportError::InvalidInput(format!("{}: {e}", cfg.display()))
                })?;

                info!(branch, file = %cfg.display(), "applying directives");
                let mut ctx = DirectiveContext {
                    patch_tree: self.workdir.path(),
                    push_tree: target.tree,
                    push: target.git,
                    lookaside: &mut *target.lookaside,
                    changelog_version: target.changelog_version.clone(),
                    today: target.today,
                };
                errors.extend(set.apply(&mut ctx));
                applied += 1;
            }
        }

        if errors.is_empty() {
            Ok(applied)
        } else {
            Err(ImportError::Directives(errors))
        }
    }

    /// `<patch dir>/CFG/*.cfg` of the checked out branch, sorted.
    fn directive_files(&self) -> Result<Vec<PathBuf>, ImportError> {
        let dir = self.workdir.path().join(&self.patch_dir).join("CFG");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| ImportError::io(&dir, e))? {
            let path = entry.map_err(|e| ImportError::io(&dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "cfg") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Committer;
    use crate::core::tree::write_file;
    use crate::core::types::BranchName;

    fn committer() -> Committer {
        Committer {
            name: "t".into(),
            email: "t@example.com".into(),
        }
    }

    /// Repository with one root commit per branch holding `files`.
    fn patch_remote(root: &Path, branches: &[(&str, &[(&str, &str)])]) -> String {
        let dir = root.join("patch");
        let git = Git::init(&dir).unwrap();

        for (branch, files) in branches {
            git.set_unborn_head(&BranchName::new(*branch).unwrap()).unwrap();
            let rocky = dir.join("ROCKY");
            if rocky.exists() {
                fs::remove_dir_all(&rocky).unwrap();
            }
            for (path, contents) in *files {
                write_file(&dir, path, contents.as_bytes()).unwrap();
            }
            git.stage_all().unwrap();
            git.commit("patches", &committer(), None).unwrap();
        }
        format!("file://{}", dir.display())
    }

    fn push_tree() -> (TempDir, Git) {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path()).unwrap();
        write_file(dir.path(), "SOURCES/branding.patch", b"x").unwrap();
        write_file(dir.path(), "SOURCES/r8.conf", b"x").unwrap();
        (dir, git)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
    }

    #[test]
    fn missing_repository_applies_nothing() {
        let root = TempDir::new().unwrap();
        let url = format!("file://{}", root.path().join("nope.git").display());
        let repo = PatchRepository::fetch(&url, "ROCKY", &GitAuth::none()).unwrap();
        assert!(!repo.is_present());

        let (dir, git) = push_tree();
        let mut lookaside = LookasideList::new();
        let mut target = PatchTarget {
            tree: dir.path(),
            git: &git,
            lookaside: &mut lookaside,
            changelog_version: None,
            today: today(),
        };
        assert_eq!(repo.apply("r8", &mut target).unwrap(), 0);
    }

    #[test]
    fn applies_main_then_push_branch() {
        let root = TempDir::new().unwrap();
        let url = patch_remote(
            root.path(),
            &[
                (
                    "main",
                    &[("ROCKY/CFG/debrand.cfg", "[[delete]]\nfile = \"SOURCES/branding.patch\"\n")],
                ),
                (
                    "r8",
                    &[("ROCKY/CFG/r8.cfg", "[[delete]]\nfile = \"SOURCES/r8.conf\"\n")],
                ),
            ],
        );
        let repo = PatchRepository::fetch(&url, "ROCKY", &GitAuth::none()).unwrap();
        assert!(repo.is_present());

        let (dir, git) = push_tree();
        let mut lookaside = LookasideList::new();
        let mut target = PatchTarget {
            tree: dir.path(),
            git: &git,
            lookaside: &mut lookaside,
            changelog_version: None,
            today: today(),
        };
        assert_eq!(repo.apply("r8", &mut target).unwrap(), 2);
        assert!(!dir.path().join("SOURCES/branding.patch").exists());
        assert!(!dir.path().join("SOURCES/r8.conf").exists());
    }

    #[test]
    fn directive_failures_are_collected() {
        let root = TempDir::new().unwrap();
        let url = patch_remote(
            root.path(),
            &[(
                "main",
                &[(
                    "ROCKY/CFG/a.cfg",
                    "[[delete]]\nfile = \"SOURCES/one\"\n\n[[delete]]\nfile = \"SOURCES/two\"\n",
                )],
            )],
        );
        let repo = PatchRepository::fetch(&url, "ROCKY", &GitAuth::none()).unwrap();

        let (dir, git) = push_tree();
        let mut lookaside = LookasideList::new();
        let mut target = PatchTarget {
            tree: dir.path(),
            git: &git,
            lookaside: &mut lookaside,
            changelog_version: None,
            today: today(),
        };
        let err = repo.apply("r8", &mut target).unwrap_err();
        let codes: Vec<String> = err
            .directive_errors()
            .unwrap()
            .iter()
            .map(DirectiveError::code_string)
            .collect();
        assert_eq!(
            codes,
            vec![
                "FILE_DOES_NOT_EXIST:SOURCES/one".to_string(),
                "FILE_DOES_NOT_EXIST:SOURCES/two".to_string()
            ]
        );
    }

    #[test]
    fn malformed_cfg_is_an_input_error() {
        let root = TempDir::new().unwrap();
        let url = patch_remote(root.path(), &[("main", &[("ROCKY/CFG/a.cfg", "[[delete]\n")])]);
        let repo = PatchRepository::fetch(&url, "ROCKY", &GitAuth::none()).unwrap();

        let (dir, git) = push_tree();
        let mut lookaside = LookasideList::new();
        let mut target = PatchTarget {
            tree: dir.path(),
            git: &git,
            lookaside: &mut lookaside,
            changelog_version: None,
            today: today(),
        };
        assert!(matches!(
            repo.apply("r8", &mut target),
            Err(ImportError::InvalidInput(_))
        ));
    }
}
