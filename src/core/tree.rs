//! core::tree
//!
//! Filesystem helpers for staging and destination trees.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Default mode for files created from scratch.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Write `bytes` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, bytes: &[u8]) -> io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes)
}

/// Permission bits of a file.
#[cfg(unix)]
pub fn file_mode(path: &Path) -> io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn file_mode(path: &Path) -> io::Result<u32> {
    fs::metadata(path)?;
    Ok(DEFAULT_FILE_MODE)
}

/// Set the permission bits of a file.
#[cfg(unix)]
pub fn set_file_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
pub fn set_file_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Copy every file under `src` into `dst`, skipping `.git`.
///
/// Existing destination files are removed before being rewritten, and the
/// source permission bits are kept. Files only present in `dst` are left
/// alone. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut copied = 0;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        if target.exists() {
            fs::remove_file(&target)?;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copy_tree_overwrites_and_skips_git_dir() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_file(src.path(), "SPECS/a.spec", b"new").unwrap();
        write_file(src.path(), ".git/HEAD", b"ref").unwrap();
        write_file(dst.path(), "SPECS/a.spec", b"old").unwrap();
        write_file(dst.path(), "SOURCES/keep", b"k").unwrap();

        let copied = copy_tree(src.path(), dst.path()).unwrap();
        assert_eq!(copied, 1);
        assert_eq!(fs::read(dst.path().join("SPECS/a.spec")).unwrap(), b"new");
        assert!(dst.path().join("SOURCES/keep").exists());
        assert!(!dst.path().join(".git/HEAD").exists());
    }

    #[cfg(unix)]
    #[test]
    fn copy_tree_keeps_mode() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_file(src.path(), "run.sh", b"#!/bin/sh\n").unwrap();
        set_file_mode(&src.path().join("run.sh"), 0o755).unwrap();

        copy_tree(src.path(), dst.path()).unwrap();
        assert_eq!(file_mode(&dst.path().join("run.sh")).unwrap(), 0o755);
    }
}
