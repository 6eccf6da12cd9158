//! engine::error
//!
//! Top-level error for an import run.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::directives::DirectiveError;
use crate::git::GitError;
use crate::lookaside::LookasideError;
use crate::module::ModuleError;
use crate::resolve::ResolveError;
use crate::storage::StorageError;

/// Any failure that aborts an import run.
///
/// Directive failures are collected rather than short-circuited and arrive
/// together in [`ImportError::Directives`]; the binary prints them as a JSON
/// array. Everything else is reported as plain text.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Lookaside(#[from] LookasideError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    /// One or more directives failed.
    #[error("{} directive error(s): {}", .0.len(), render_directive_errors(.0))]
    Directives(Vec<DirectiveError>),

    /// Upstream content is not in a shape that can be imported.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An external tool failed or is missing.
    #[error("{tool} failed: {message}")]
    Tool {
        tool: &'static str,
        message: String,
    },

    /// The source RPM header could not be read.
    #[error("cannot read rpm {path}: {message}")]
    Rpm { path: PathBuf, message: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ImportError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ImportError::Io {
            path: path.into(),
            source,
        }
    }

    /// The directive failures carried by this error, if any.
    pub fn directive_errors(&self) -> Option<&[DirectiveError]> {
        match self {
            ImportError::Directives(errors) => Some(errors),
            _ => None,
        }
    }
}

fn render_directive_errors(errors: &[DirectiveError]) -> String {
    errors
        .iter()
        .map(|e| e.code_string())
        .collect::<Vec<_>>()
        .join(", ")
}
