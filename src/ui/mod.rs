//! ui
//!
//! Output for the binary.
//!
//! # Modules
//!
//! - [`output`] - Verbosity, the JSON publish report and directive error arrays

pub mod output;
