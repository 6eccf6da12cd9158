//! cli
//!
//! Command-line interface layer for distmirror.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Merge the config file under the flags
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! [`crate::engine`] and [`crate::lookaside`]. Logging is installed by the
//! binary before [`run`] is called.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, ImportArgs, Shell};

use anyhow::Result;

/// Run a parsed command line.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    commands::dispatch(cli.command, cli.config.as_deref())
}
