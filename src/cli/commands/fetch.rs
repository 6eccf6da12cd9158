//! fetch command - Download the lookaside sources of a checked out package

use anyhow::{Context as _, Result};
use std::path::Path;
use tracing::info;

use crate::lookaside::fetch::fetch_sources;
use crate::lookaside::HttpFetcher;

/// Populate `path` with the blobs its metadata file lists.
pub fn fetch(cdn_url: &str, path: &Path) -> Result<()> {
    let fetcher = HttpFetcher::new(None)?;
    let lines = fetch_sources(path, cdn_url, &fetcher)
        .with_context(|| format!("could not fetch sources into {}", path.display()))?;
    info!(count = lines.len(), "fetched lookaside sources");
    Ok(())
}
