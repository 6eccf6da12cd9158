//! lookaside::entries
//!
//! The pending lookaside list for the branch being imported.
//!
//! # Lifecycle
//!
//! Every entry is marked expired at the top of a branch iteration. The
//! importer re-tracks the entries the branch actually carries, which
//! clears the flag. Only live entries whose file is on disk at publish
//! time end up in the metadata file and blob storage.

use super::checksum::HashAlgorithm;

/// A source file kept out of git and stored by digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookasideEntry {
    /// Path relative to the tree root (e.g. `SOURCES/foo.tar.gz`)
    pub path: String,
    pub algorithm: HashAlgorithm,
    pub expired: bool,
}

/// Ordered set of lookaside entries, unique by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookasideList {
    entries: Vec<LookasideEntry>,
}

impl LookasideList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every entry expired.
    pub fn expire_all(&mut self) {
        for entry in &mut self.entries {
            entry.expired = true;
        }
    }

    /// Track `path` as a live entry, adding it if needed.
    pub fn track(&mut self, path: impl Into<String>, algorithm: HashAlgorithm) {
        let path = path.into();
        match self.entries.iter_mut().find(|e| e.path == path) {
            Some(entry) => {
                entry.algorithm = algorithm;
                entry.expired = false;
            }
            None => self.entries.push(LookasideEntry {
                path,
                algorithm,
                expired: false,
            }),
        }
    }

    /// Expire a single entry. Returns whether it was tracked.
    pub fn expire(&mut self, path: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.path == path) {
            Some(entry) => {
                entry.expired = true;
                true
            }
            None => false,
        }
    }

    /// Entries that are not expired, in insertion order.
    pub fn live(&self) -> impl Iterator<Item = &LookasideEntry> {
        self.entries.iter().filter(|e| !e.expired)
    }

    /// Whether `path` is tracked and live.
    pub fn is_live(&self, path: &str) -> bool {
        self.live().any(|e| e.path == path)
    }

    /// All entries, expired included.
    pub fn iter(&self) -> impl Iterator<Item = &LookasideEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
