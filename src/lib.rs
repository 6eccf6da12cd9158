//! distmirror - Mirror dist-git package imports into a downstream forge
//!
//! distmirror takes the import history of an upstream dist-git repository
//! (tags or branches encoding successive source RPM or module imports) and
//! republishes every import as a commit plus annotated tag in a downstream
//! repository, with large sources moved to content-addressed blob storage
//! and optional patch directives applied on the way.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates)
//! - [`engine`] - The per-branch commit and publish pipeline
//! - [`core`] - Settings, strong types, NVR parsing and tree layout
//! - [`resolve`] - Upstream ref to push branch and import tag mapping
//! - [`import`] - Upstream content per ref (dist-git or local source RPM)
//! - [`lookaside`] - Checksums, metadata file, blob retrieval and upload
//! - [`storage`] - Blob storage backends
//! - [`directives`] - Patch directives and the spec rewriter
//! - [`patches`] - Patch repository retrieval
//! - [`module`] - Module metadata rewriting
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Output for the binary
//!
//! # Correctness Invariants
//!
//! 1. Refs are imported one at a time, in discovery order
//! 2. Lookaside content is accepted only when its digest verifies
//! 3. A digest is uploaded at most once per run
//! 4. Directive failures are collected and reported together

pub mod cli;
pub mod core;
pub mod directives;
pub mod engine;
pub mod git;
pub mod import;
pub mod lookaside;
pub mod module;
pub mod patches;
pub mod resolve;
pub mod storage;
pub mod ui;
