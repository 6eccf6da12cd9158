//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Upstream clones,
//! destination repositories and the patch repository are all driven
//! through [`Git`]. No other module imports `git2`, and nothing shells out
//! to the git CLI.
//!
//! # Responsibilities
//!
//! - Repository creation and opening
//! - Remotes, fetch, push and remote ref listing
//! - Transport credentials (ssh key or agent, https basic auth)
//! - Checkout, index staging and status
//! - Commits and annotated tags
//!
//! # Invariants
//!
//! - All operations return strong types (Oid, BranchName, RefName)
//! - Push refspecs carry their own force marker

mod credentials;
mod interface;

pub use credentials::GitAuth;
pub use interface::{Git, GitError, RefEntry, TimedRef};
