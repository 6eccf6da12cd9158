//! engine
//!
//! Orchestrates an import run: retrieve the source, then resolve, assemble,
//! patch, commit, tag and push every selected ref in discovery order.
//!
//! # Architecture
//!
//! The engine owns the run. Collaborators are injected so tests can stand
//! in for the network:
//!
//! - [`Importer`](crate::import::Importer) - upstream content per ref
//! - [`BlobStorage`](crate::storage::BlobStorage) - lookaside backend
//! - [`OriginFetcher`](crate::lookaside::OriginFetcher) - origin downloads
//! - [`TipResolver`](crate::module::TipResolver) - component tips (module mode)
//!
//! [`run`] wires the production collaborators from a [`RunConfig`].
//!
//! # Invariants
//!
//! - Branches are processed one at a time, in discovery order
//! - The upstream staging tree is reset by the importer for every ref; the
//!   destination worktree is fresh for every ref
//! - A digest is written to blob storage at most once per run
//! - Under no-dup mode a ref whose import tag exists downstream produces
//!   no commit, no push and no result entry
//!
//! # Example
//!
//! ```ignore
//! use distmirror::core::config::{ConfigFile, RunConfig};
//!
//! let config = RunConfig::builder("httpd")
//!     .apply(&ConfigFile { storage_addr: Some("file:///srv/lookaside".into()), ..Default::default() })
//!     .build()?;
//! let result = distmirror::engine::run(&config)?;
//! println!("{}", serde_json::to_string(&result)?);
//! ```

mod error;
mod publish;

pub use error::ImportError;
pub use publish::{Pipeline, PublishResult, RunState};

use tracing::info;

use crate::core::config::RunConfig;
use crate::import::create_importer;
use crate::lookaside::HttpFetcher;
use crate::storage::create_storage;

/// Run an import with the production collaborators.
///
/// # Errors
///
/// See [`Pipeline::run`]. Storage and HTTP client setup errors are
/// reported before anything is fetched.
pub fn run(config: &RunConfig) -> Result<PublishResult, ImportError> {
    info!(
        package = %config.package,
        source = %config.source_url(),
        downstream = %config.downstream_url(),
        "starting import"
    );
    let storage = create_storage(&config.storage_addr)?;
    let fetcher = HttpFetcher::new(config.basic_auth.clone())?;
    let importer = create_importer(config)?;

    Pipeline::new(config, importer, storage, Box::new(fetcher)).run()
}
