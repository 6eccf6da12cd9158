//! ui::output
//!
//! Everything the binary writes.
//!
//! # Design
//!
//! stdout carries only machine-readable output: the publish report, or the
//! JSON array of directive failures. Diagnostics go to stderr, either
//! through `tracing` or through [`error`].

use std::fmt::Display;
use std::io::Write;

use crate::directives::DirectiveError;
use crate::engine::PublishResult;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    Normal,
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. `--quiet` wins over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Log filter forced by the flags, or `None` to honor `RUST_LOG`.
    pub fn forced_filter(self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("warn"),
            Verbosity::Normal => None,
            Verbosity::Debug => Some("debug"),
        }
    }
}

/// Render collected directive failures as a JSON array of `CODE:subject`.
///
/// # Example
///
/// ```
/// use distmirror::directives::{DirectiveError, ErrorCode};
/// use distmirror::ui::output::directive_errors_json;
///
/// let errors = vec![DirectiveError::new(ErrorCode::FileDoesNotExist, "SOURCES/a")];
/// assert_eq!(directive_errors_json(&errors), r#"["FILE_DOES_NOT_EXIST:SOURCES/a"]"#);
/// ```
pub fn directive_errors_json(errors: &[DirectiveError]) -> String {
    let codes: Vec<String> = errors.iter().map(DirectiveError::code_string).collect();
    serde_json::Value::from(codes).to_string()
}

/// Write the publish report to `out` as a single JSON line.
pub fn write_result(out: &mut impl Write, result: &PublishResult) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, result)?;
    writeln!(out)
}

/// Print the publish report on stdout.
pub fn print_result(result: &PublishResult) -> std::io::Result<()> {
    write_result(&mut std::io::stdout().lock(), result)
}

/// Print directive failures on stdout.
pub fn print_directive_errors(errors: &[DirectiveError]) {
    println!("{}", directive_errors_json(errors));
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::ErrorCode;

    #[test]
    fn quiet_wins() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true).forced_filter(), Some("debug"));
        assert_eq!(Verbosity::from_flags(false, false).forced_filter(), None);
    }

    #[test]
    fn directive_errors_keep_order() {
        let errors = vec![
            DirectiveError::new(ErrorCode::InvalidFile, "SOURCES/a"),
            DirectiveError::new(ErrorCode::OnlyOneSpecFileIsSupported, ""),
        ];
        let parsed: Vec<String> = serde_json::from_str(&directive_errors_json(&errors)).unwrap();
        assert_eq!(
            parsed,
            vec!["INVALID_FILE:SOURCES/a", "ONLY_ONE_SPEC_FILE_IS_SUPPORTED"]
        );
    }

    #[test]
    fn result_is_one_line() {
        let mut result = PublishResult::default();
        result.branch_commits.insert("r8".into(), "abc".into());
        let mut out = Vec::new();
        write_result(&mut out, &result).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(r#""r8":"abc""#));
    }
}
