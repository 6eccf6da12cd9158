//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Turns its arguments into library settings
//! 2. Calls into the library
//! 3. Writes its report on stdout
//!
//! Diagnostics are left to `tracing` and to the caller's error reporting.

mod completion;
mod fetch;
mod import;

pub use completion::completion;
pub use fetch::fetch;
pub use import::import;

use std::path::Path;

use anyhow::Result;

use crate::cli::args::Command;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, config_path: Option<&Path>) -> Result<()> {
    match command {
        Command::Import(args) => import(&args, config_path),
        Command::Fetch { cdn_url, path } => fetch(&cdn_url, &path),
        Command::Completion { shell } => completion(shell),
    }
}
