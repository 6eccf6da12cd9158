//! git::interface
//!
//! Git interface implementation using git2.
//!
//! Every repository the importer touches (the upstream clone, each
//! per-branch destination repository and the patch repository) is a
//! non-bare repository on disk opened through [`Git`]. Remotes are
//! reached through libgit2 transports; `file://` URLs work without
//! credentials.
//!
//! # Error Handling
//!
//! git2 errors are folded into [`GitError`] with the operation that
//! failed as context. Callers decide which failures mean "absent" (for
//! example a downstream repository that does not exist yet) and which
//! are fatal.
//!
//! # Example
//!
//! ```ignore
//! use distmirror::git::{Git, GitAuth};
//!
//! let git = Git::init(dir.path())?;
//! git.add_remote("upstream", "https://git.centos.org/rpms/bash")?;
//! git.fetch("upstream", &["+refs/heads/*:refs/remotes/upstream/*"], &GitAuth::none())?;
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::credentials::GitAuth;
use crate::core::config::Committer;
use crate::core::types::{BranchName, Oid, RefName, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("not a git repository: {path}")]
    NotARepo { path: PathBuf },

    /// Every repository the importer opens needs a working directory.
    #[error("repository at {path} has no working directory")]
    NoWorkDir { path: PathBuf },

    #[error("ref not found: {refname}")]
    RefNotFound { refname: String },

    #[error("object not found: {oid}")]
    ObjectNotFound { oid: String },

    /// A ref name, tag name or object id git would not accept.
    #[error("invalid name: {message}")]
    InvalidName { message: String },

    /// Authentication or transport failure talking to a remote.
    #[error("remote {remote}: {message}")]
    Remote { remote: String, message: String },

    /// The remote refused one of the pushed refs.
    #[error("push of {refname} rejected: {message}")]
    PushRejected { refname: String, message: String },

    #[error("{what} is locked: {message}")]
    Locked { what: String, message: String },

    #[error("git {operation}: {message}")]
    Internal { operation: String, message: String },
}

impl GitError {
    /// Classify a git2 error; `context` names the ref, object or operation.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        use git2::{ErrorClass, ErrorCode};

        let message = err.message().to_string();
        match (err.code(), err.class()) {
            (ErrorCode::NotFound, _) if context.starts_with("refs/") => GitError::RefNotFound {
                refname: context.to_string(),
            },
            (ErrorCode::NotFound, _) => GitError::ObjectNotFound {
                oid: context.to_string(),
            },
            (ErrorCode::InvalidSpec, _) => GitError::InvalidName {
                message: format!("{context}: {message}"),
            },
            (ErrorCode::Locked, _) => GitError::Locked {
                what: context.to_string(),
                message,
            },
            (ErrorCode::Auth, _) | (_, ErrorClass::Net | ErrorClass::Ssh | ErrorClass::Http) => {
                GitError::Remote {
                    remote: context.to_string(),
                    message,
                }
            }
            _ => GitError::Internal {
                operation: context.to_string(),
                message,
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidName {
            message: err.to_string(),
        }
    }
}

/// A ref with its name and target OID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The OID the ref points to (the tag object for annotated tags)
    pub oid: Oid,
}

/// A local ref together with the time used to order imports.
///
/// For annotated tags the time is the tagger time; for everything else it
/// is the committer time of the target commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedRef {
    pub name: RefName,
    /// Seconds since the Unix epoch
    pub time: i64,
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. No other module
/// imports `git2`.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Create a new repository with a working directory at `path`.
    pub fn init(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init(path)
            .map_err(|e| GitError::from_git2(e, &path.display().to_string()))?;
        Ok(Self { repo })
    }

    /// Open the repository whose working directory is `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::NoWorkDir`] if the repository is bare
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        let git = Self { repo };
        git.work_dir()?;
        Ok(git)
    }

    /// Path to the working directory.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or_else(|| GitError::NoWorkDir {
            path: self.repo.path().to_path_buf(),
        })
    }

    // =========================================================================
    // Remotes and Transport
    // =========================================================================

    /// Add a named remote.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo
            .remote(name, url)
            .map_err(|e| GitError::from_git2(e, &format!("remote {name}")))?;
        debug!(name, url, "added remote");
        Ok(())
    }

    /// Fetch `refspecs` from a named remote.
    ///
    /// Refspecs naming branches the remote does not have are not an error;
    /// the corresponding local refs simply do not appear.
    pub fn fetch(&self, remote: &str, refspecs: &[&str], auth: &GitAuth) -> Result<(), GitError> {
        let mut handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| GitError::from_git2(e, &format!("remote {remote}")))?;

        let mut options = git2::FetchOptions::new();
        options.remote_callbacks(auth.callbacks());
        options.download_tags(git2::AutotagOption::None);

        debug!(remote, ?refspecs, "fetching");
        handle
            .fetch(refspecs, Some(&mut options), None)
            .map_err(|e| remote_error(e, remote))
    }

    /// Push `refspecs` to a named remote.
    ///
    /// Refspecs should carry a leading `+` to force the update.
    ///
    /// # Errors
    ///
    /// - [`GitError::PushRejected`] if the remote refused any ref
    /// - [`GitError::Remote`] on transport or authentication failures
    pub fn push(&self, remote: &str, refspecs: &[String], auth: &GitAuth) -> Result<(), GitError> {
        let mut handle = self
            .repo
            .find_remote(remote)
            .map_err(|e| GitError::from_git2(e, &format!("remote {remote}")))?;

        let mut rejected: Option<(String, String)> = None;
        {
            let mut callbacks = auth.callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejected = Some((refname.to_string(), message.to_string()));
                }
                Ok(())
            });

            let mut options = git2::PushOptions::new();
            options.remote_callbacks(callbacks);

            debug!(remote, ?refspecs, "pushing");
            handle
                .push(refspecs, Some(&mut options))
                .map_err(|e| remote_error(e, remote))?;
        }

        match rejected {
            Some((refname, message)) => Err(GitError::PushRejected { refname, message }),
            None => Ok(()),
        }
    }

    /// List the refs advertised by a remote URL without cloning it.
    ///
    /// Peeled tag entries (`^{}`) are omitted.
    pub fn list_remote(url: &str, auth: &GitAuth) -> Result<Vec<RefEntry>, GitError> {
        let mut remote = git2::Remote::create_detached(url).map_err(|e| remote_error(e, url))?;
        let mut connection = remote
            .connect_auth(git2::Direction::Fetch, Some(auth.callbacks()), None)
            .map_err(|e| remote_error(e, url))?;

        let mut refs = Vec::new();
        for head in connection.remote().list().map_err(|e| remote_error(e, url))? {
            if head.name().ends_with("^{}") || head.name() == "HEAD" {
                continue;
            }
            refs.push(RefEntry {
                name: RefName::new(head.name())?,
                oid: Oid::new(head.oid().to_string())?,
            });
        }
        debug!(url, count = refs.len(), "listed remote refs");
        Ok(refs)
    }

    // =========================================================================
    // Ref Queries
    // =========================================================================

    /// Resolve a ref or revision to the commit it points to.
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?;
        Ok(Oid::new(commit.id().to_string())?)
    }

    /// Like [`resolve_ref`](Self::resolve_ref), returning `None` for
    /// missing refs.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) | Err(GitError::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether a commit object exists locally.
    pub fn has_commit(&self, oid: &Oid) -> bool {
        git2::Oid::from_str(oid.as_str())
            .and_then(|id| self.repo.find_commit(id))
            .is_ok()
    }

    /// Local refs matching a glob, each with its ordering time.
    pub fn list_refs_with_time(&self, glob: &str) -> Result<Vec<TimedRef>, GitError> {
        let references = self
            .repo
            .references_glob(glob)
            .map_err(|e| GitError::from_git2(e, glob))?;

        let mut refs = Vec::new();
        for reference in references {
            let reference = reference.map_err(|e| GitError::from_git2(e, glob))?;
            let Some(name) = reference.name() else {
                continue;
            };
            let name = name.to_string();

            let tagger_time = reference
                .peel_to_tag()
                .ok()
                .and_then(|tag| tag.tagger().map(|s| s.when().seconds()));
            let time = match tagger_time {
                Some(time) => time,
                None => reference
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, &name))?
                    .committer()
                    .when()
                    .seconds(),
            };

            refs.push(TimedRef {
                name: RefName::new(name)?,
                time,
            });
        }
        Ok(refs)
    }

    /// The commit HEAD points to, or `None` on an unborn branch.
    pub fn head_oid(&self) -> Result<Option<Oid>, GitError> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?;
                Ok(Some(Oid::new(commit.id().to_string())?))
            }
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Force the working directory to `oid` with a detached HEAD.
    ///
    /// Untracked and ignored files are removed so the tree matches the
    /// commit exactly.
    pub fn checkout_detached(&self, oid: &Oid) -> Result<(), GitError> {
        let commit = self.find_commit(oid)?;
        let mut builder = force_checkout();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut builder))
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        self.repo
            .set_head_detached(commit.id())
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        Ok(())
    }

    /// Point local `branch` at `oid`, make it HEAD and force the working
    /// directory to match.
    pub fn checkout_branch_at(&self, branch: &BranchName, oid: &Oid) -> Result<(), GitError> {
        let refname = RefName::for_branch(branch);
        let commit = self.find_commit(oid)?;
        self.repo
            .reference(refname.as_str(), commit.id(), true, "distmirror: checkout")
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        self.repo
            .set_head(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        let mut builder = force_checkout();
        self.repo
            .checkout_head(Some(&mut builder))
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        Ok(())
    }

    /// Make HEAD a symbolic ref to a branch that has no commits yet.
    pub fn set_unborn_head(&self, branch: &BranchName) -> Result<(), GitError> {
        let refname = RefName::for_branch(branch);
        self.repo
            .set_head(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))
    }

    // =========================================================================
    // Index and Status
    // =========================================================================

    /// Stage a file or directory (relative to the working directory).
    ///
    /// Ignored files are skipped.
    pub fn stage_path(&self, path: &str) -> Result<(), GitError> {
        let mut index = self.index()?;
        let full = self.work_dir()?.join(path);
        if full.is_dir() {
            let pattern = format!("{}/*", path.trim_end_matches('/'));
            index
                .add_all([pattern.as_str()], git2::IndexAddOption::DEFAULT, None)
                .map_err(|e| GitError::from_git2(e, path))?;
        } else {
            index
                .add_path(Path::new(path))
                .map_err(|e| GitError::from_git2(e, path))?;
        }
        index.write().map_err(|e| GitError::from_git2(e, "index"))
    }

    /// Stage every change in the working directory, including deletions.
    pub fn stage_all(&self) -> Result<(), GitError> {
        let mut index = self.index()?;
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .map_err(|e| GitError::from_git2(e, "index"))?;
        index
            .update_all(["*"], None)
            .map_err(|e| GitError::from_git2(e, "index"))?;
        index.write().map_err(|e| GitError::from_git2(e, "index"))
    }

    /// Remove a path (file or directory) from the index.
    pub fn remove_path(&self, path: &str) -> Result<(), GitError> {
        let mut index = self.index()?;
        index
            .remove_path(Path::new(path))
            .map_err(|e| GitError::from_git2(e, path))?;
        index
            .remove_dir(Path::new(path), 0)
            .map_err(|e| GitError::from_git2(e, path))?;
        index.write().map_err(|e| GitError::from_git2(e, "index"))
    }

    /// Paths present in the index but deleted from the working directory.
    pub fn deleted_paths(&self) -> Result<Vec<String>, GitError> {
        let mut options = git2::StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .map_err(|e| GitError::from_git2(e, "status"))?;

        Ok(statuses
            .iter()
            .filter(|entry| entry.status().is_wt_deleted())
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect())
    }

    /// Paths recorded in the index.
    pub fn index_paths(&self) -> Result<Vec<String>, GitError> {
        let index = self.index()?;
        Ok(index
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect())
    }

    // =========================================================================
    // Commits and Tags
    // =========================================================================

    /// Commit the index on HEAD.
    ///
    /// `parent` is the previous branch tip; `None` creates a root commit on
    /// the (unborn) HEAD branch.
    pub fn commit(
        &self,
        message: &str,
        committer: &Committer,
        parent: Option<&Oid>,
    ) -> Result<Oid, GitError> {
        let signature = signature(committer)?;
        let mut index = self.index()?;
        let tree_id = index
            .write_tree()
            .map_err(|e| GitError::from_git2(e, "write tree"))?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(|e| GitError::from_git2(e, "tree"))?;

        let parents = match parent {
            Some(oid) => vec![self.find_commit(oid)?],
            None => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let id = self
            .repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parent_refs,
            )
            .map_err(|e| GitError::from_git2(e, "commit"))?;
        Ok(Oid::new(id.to_string())?)
    }

    /// Create (or replace) an annotated tag pointing at `target`.
    pub fn create_annotated_tag(
        &self,
        name: &str,
        target: &Oid,
        tagger: &Committer,
        message: &str,
    ) -> Result<Oid, GitError> {
        let refname = RefName::for_tag(name)?;
        let signature = signature(tagger)?;
        let commit = self.find_commit(target)?;
        let id = self
            .repo
            .tag(name, commit.as_object(), &signature, message, true)
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        Ok(Oid::new(id.to_string())?)
    }

    /// Read a file from a commit's tree.
    pub fn read_file_at(&self, oid: &Oid, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        let commit = self.find_commit(oid)?;
        let tree = commit
            .tree()
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, path)),
        };
        let blob = self
            .repo
            .find_blob(entry.id())
            .map_err(|e| GitError::from_git2(e, path))?;
        Ok(Some(blob.content().to_vec()))
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let id = git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::InvalidName {
            message: format!("{oid}: {}", e.message()),
        })?;
        self.repo
            .find_commit(id)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn index(&self) -> Result<git2::Index, GitError> {
        self.repo
            .index()
            .map_err(|e| GitError::from_git2(e, "index"))
    }
}

fn force_checkout() -> git2::build::CheckoutBuilder<'static> {
    let mut builder = git2::build::CheckoutBuilder::new();
    builder
        .force()
        .remove_untracked(true)
        .remove_ignored(true);
    builder
}

fn signature(who: &Committer) -> Result<git2::Signature<'static>, GitError> {
    git2::Signature::now(&who.name, &who.email).map_err(|e| GitError::InvalidName {
        message: format!("signature '{} <{}>': {}", who.name, who.email, e.message()),
    })
}

fn remote_error(err: git2::Error, remote: &str) -> GitError {
    GitError::Remote {
        remote: remote.to_string(),
        message: err.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn committer() -> Committer {
        Committer {
            name: "Test".into(),
            email: "test@example.com".into(),
        }
    }

    fn repo_with_file(name: &str, contents: &str) -> (TempDir, Git, Oid) {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path()).unwrap();
        fs::write(dir.path().join(name), contents).unwrap();
        git.stage_all().unwrap();
        let oid = git.commit("initial", &committer(), None).unwrap();
        (dir, git, oid)
    }

    #[test]
    fn open_rejects_plain_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Git::open(dir.path()),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn head_is_none_until_first_commit() {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path()).unwrap();
        assert_eq!(git.head_oid().unwrap(), None);

        fs::write(dir.path().join("a"), "a").unwrap();
        git.stage_all().unwrap();
        let oid = git.commit("first", &committer(), None).unwrap();
        assert_eq!(git.head_oid().unwrap(), Some(oid));
    }

    #[test]
    fn commit_on_unborn_branch_creates_it() {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path()).unwrap();
        let branch = BranchName::new("r8").unwrap();
        git.set_unborn_head(&branch).unwrap();

        fs::write(dir.path().join("a"), "a").unwrap();
        git.stage_all().unwrap();
        let oid = git.commit("first", &committer(), None).unwrap();
        assert_eq!(git.resolve_ref("refs/heads/r8").unwrap(), oid);
    }

    #[test]
    fn deleted_paths_reports_missing_tracked_files() {
        let (dir, git, _) = repo_with_file("gone.txt", "x");
        fs::remove_file(dir.path().join("gone.txt")).unwrap();
        assert_eq!(git.deleted_paths().unwrap(), vec!["gone.txt".to_string()]);

        git.remove_path("gone.txt").unwrap();
        assert!(git.deleted_paths().unwrap().is_empty());
        assert!(git.index_paths().unwrap().is_empty());
    }

    #[test]
    fn stage_all_skips_ignored_files() {
        let dir = TempDir::new().unwrap();
        let git = Git::init(dir.path()).unwrap();
        fs::write(dir.path().join(".gitignore"), "big.tar.gz\n").unwrap();
        fs::write(dir.path().join("big.tar.gz"), "blob").unwrap();
        fs::write(dir.path().join("keep"), "k").unwrap();
        git.stage_all().unwrap();

        let mut paths = git.index_paths().unwrap();
        paths.sort();
        assert_eq!(paths, vec![".gitignore".to_string(), "keep".to_string()]);
    }

    #[test]
    fn annotated_tag_time_orders_refs() {
        let (_dir, git, oid) = repo_with_file("a", "a");
        git.create_annotated_tag("imports/c8/a-1-1.el8", &oid, &committer(), "import")
            .unwrap();

        let refs = git.list_refs_with_time("refs/tags/imports/*").unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name.as_str(), "refs/tags/imports/c8/a-1-1.el8");
        assert!(refs[0].time > 0);
        assert_eq!(git.resolve_ref("refs/tags/imports/c8/a-1-1.el8").unwrap(), oid);
    }

    #[test]
    fn fetch_push_and_list_over_file_remote() {
        let (_src_dir, _src, oid) = repo_with_file("spec", "content");
        let remote_dir = TempDir::new().unwrap();
        git2::Repository::init_bare(remote_dir.path()).unwrap();
        let remote_url = format!("file://{}", remote_dir.path().display());

        let src = Git::open(_src_dir.path()).unwrap();
        src.add_remote("origin", &remote_url).unwrap();
        src.create_annotated_tag("imports/r8/x-1-1.el8", &oid, &committer(), "import")
            .unwrap();
        let head = src.repo.head().unwrap().name().unwrap().to_string();
        src.push(
            "origin",
            &[
                format!("+{head}:refs/heads/r8"),
                "+refs/tags/imports/r8/x-1-1.el8:refs/tags/imports/r8/x-1-1.el8".to_string(),
            ],
            &GitAuth::none(),
        )
        .unwrap();

        let listed = Git::list_remote(&remote_url, &GitAuth::none()).unwrap();
        let names: Vec<&str> = listed.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"refs/heads/r8"));
        assert!(names.contains(&"refs/tags/imports/r8/x-1-1.el8"));

        let dst_dir = TempDir::new().unwrap();
        let dst = Git::init(dst_dir.path()).unwrap();
        dst.add_remote("origin", &remote_url).unwrap();
        dst.fetch(
            "origin",
            &["+refs/heads/r8:refs/remotes/origin/r8"],
            &GitAuth::none(),
        )
        .unwrap();
        assert_eq!(dst.resolve_ref("refs/remotes/origin/r8").unwrap(), oid);

        let branch = BranchName::new("r8").unwrap();
        dst.checkout_branch_at(&branch, &oid).unwrap();
        assert_eq!(
            fs::read_to_string(dst_dir.path().join("spec")).unwrap(),
            "content"
        );
    }

    #[test]
    fn read_file_at_returns_none_for_missing_path() {
        let (_dir, git, oid) = repo_with_file("a", "hello");
        assert_eq!(git.read_file_at(&oid, "a").unwrap().unwrap(), b"hello");
        assert_eq!(git.read_file_at(&oid, "missing").unwrap(), None);
    }
}
