//! core
//!
//! Core domain types and settings shared by every stage of an import.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName
//! - [`config`] - Per-run settings and the config file
//! - [`nvr`] - Name-Version-Release parsing
//! - [`naming`] - Downstream repository naming
//! - [`paths`] - Layout of the normalized package tree
//! - [`tree`] - Copying and writing files in staged trees

pub mod config;
pub mod naming;
pub mod nvr;
pub mod paths;
pub mod tree;
pub mod types;
