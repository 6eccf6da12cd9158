//! distmirror binary
//!
//! Logs go to stderr; stdout carries only the JSON report or the JSON
//! array of directive failures.

use std::process::ExitCode;

use distmirror::cli::{self, Cli};
use distmirror::engine::ImportError;
use distmirror::ui::output::{self, Verbosity};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbosity: Verbosity) {
    let filter = match verbosity.forced_filter() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(Verbosity::from_flags(cli.quiet, cli.debug));

    match cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err
                .downcast_ref::<ImportError>()
                .and_then(ImportError::directive_errors)
            {
                Some(errors) => output::print_directive_errors(errors),
                None => output::error(format!("{err:#}")),
            }
            ExitCode::FAILURE
        }
    }
}
