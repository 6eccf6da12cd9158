//! import::srpm_mode
//!
//! Import from a local source RPM.
//!
//! The package is parsed with the `rpm` crate and its cpio payload is
//! decompressed and unpacked in-process, once. File modes come from the
//! cpio entries. Every `*.spec` file lands in `SPECS/`,
//! everything else in `SOURCES/`; tarballs (any name containing `.tar`)
//! become lookaside entries hashed with SHA-256 and are listed in
//! `.gitignore`.
//!
//! A source RPM carries a single import, exposed as the ref
//! `refs/tags/imports/<import branch>/<nvr>`.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::payload;
use super::{drop_lookaside_and_stage, write_tree_file, BranchContext, Importer, SourcePackage};
use crate::core::config::RunConfig;
use crate::core::paths::{is_lookaside_candidate, SOURCES_DIR, SPECS_DIR};
use crate::core::tree::set_file_mode;
use crate::engine::ImportError;
use crate::git::Git;
use crate::lookaside::{ensure_gitignore, BlobManager, HashAlgorithm};

/// A file unpacked from the payload.
#[derive(Debug, Clone)]
struct PayloadFile {
    name: String,
    mode: u32,
}

impl PayloadFile {
    fn tree_path(&self) -> String {
        if self.name.ends_with(".spec") {
            format!("{SPECS_DIR}/{}", self.name)
        } else {
            format!("{SOURCES_DIR}/{}", self.name)
        }
    }
}

/// Importer for a local `.src.rpm`.
pub struct SrpmImporter {
    path: PathBuf,
    workdir: TempDir,
    files: Vec<PayloadFile>,
}

impl std::fmt::Debug for SrpmImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrpmImporter")
            .field("path", &self.path)
            .field("files", &self.files.len())
            .finish()
    }
}

impl SrpmImporter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ImportError> {
        let workdir = TempDir::new().map_err(|e| ImportError::io(std::env::temp_dir(), e))?;
        Ok(Self {
            path: path.into(),
            workdir,
            files: Vec::new(),
        })
    }

    fn payload_dir(&self) -> PathBuf {
        self.workdir.path().join("payload")
    }

    fn tree(&self) -> PathBuf {
        self.workdir.path().join("tree")
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Package name from the header, plus the compressed payload.
    fn read_package(&self) -> Result<(String, Vec<u8>), ImportError> {
        let file = File::open(&self.path).map_err(|e| ImportError::io(&self.path, e))?;
        let mut reader = BufReader::new(file);
        let pkg = rpm::Package::parse(&mut reader).map_err(|e| self.rpm_error(e.to_string()))?;

        let name = pkg
            .metadata
            .get_name()
            .map_err(|e| self.rpm_error(format!("no package name: {e}")))?
            .to_string();
        Ok((name, pkg.content))
    }

    fn rpm_error(&self, message: String) -> ImportError {
        ImportError::Rpm {
            path: self.path.clone(),
            message,
        }
    }
}

impl Importer for SrpmImporter {
    fn retrieve_source(&mut self, config: &RunConfig) -> Result<SourcePackage, ImportError> {
        let (header_name, content) = self.read_package()?;
        if header_name != config.package {
            warn!(
                header = %header_name,
                file = %config.package,
                "package name in header differs from file name"
            );
        }

        let payload = self.payload_dir();
        info!(path = %self.path.display(), "unpacking source rpm");
        let mut files: Vec<PayloadFile> = payload::unpack(&content, &payload)
            .map_err(|e| self.rpm_error(format!("payload: {e}")))?
            .into_iter()
            .map(|(name, mode)| PayloadFile { name, mode })
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = files.len(), "payload files");
        self.files = files;

        let nvr = self
            .file_name()
            .trim_end_matches(".rpm")
            .trim_end_matches(".src")
            .to_string();
        let tag = format!(
            "refs/tags/imports/{}/{}",
            config.resolver.settings().import_branch(),
            nvr
        );

        let tree = self.tree();
        fs::create_dir_all(&tree).map_err(|e| ImportError::io(&tree, e))?;
        Ok(SourcePackage {
            name: config.package.clone(),
            refs: vec![tag],
            tree,
        })
    }

    fn write_source(
        &mut self,
        _config: &RunConfig,
        ctx: &mut BranchContext,
        _blobs: &mut BlobManager,
    ) -> Result<(), ImportError> {
        if ctx.tree.exists() {
            fs::remove_dir_all(&ctx.tree).map_err(|e| ImportError::io(&ctx.tree, e))?;
        }
        fs::create_dir_all(ctx.tree.join(SPECS_DIR))
            .map_err(|e| ImportError::io(&ctx.tree, e))?;
        fs::create_dir_all(ctx.tree.join(SOURCES_DIR))
            .map_err(|e| ImportError::io(&ctx.tree, e))?;

        let payload = self.payload_dir();
        let mut ignored = Vec::new();
        for file in &self.files {
            let source = payload.join(&file.name);
            let bytes = fs::read(&source).map_err(|e| ImportError::io(&source, e))?;
            let rel = file.tree_path();
            write_tree_file(&ctx.tree, &rel, &bytes)?;
            let target = ctx.tree.join(&rel);
            set_file_mode(&target, file.mode).map_err(|e| ImportError::io(&target, e))?;

            if is_lookaside_candidate(&file.name) {
                ctx.lookaside.track(rel.clone(), HashAlgorithm::Sha256);
                ignored.push(rel);
            }
        }

        ensure_gitignore(&ctx.tree, ignored.iter().map(String::as_str))?;
        Ok(())
    }

    fn post_process(&self, ctx: &BranchContext, dest: &Git) -> Result<(), ImportError> {
        drop_lookaside_and_stage(&ctx.lookaside, dest)
    }

    fn import_name(&self, _config: &RunConfig, _ctx: &BranchContext) -> String {
        self.file_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_files_are_sorted_by_extension() {
        let spec = PayloadFile {
            name: "httpd.spec".into(),
            mode: 0o644,
        };
        let tarball = PayloadFile {
            name: "httpd-2.4.37.tar.bz2".into(),
            mode: 0o644,
        };
        assert_eq!(spec.tree_path(), "SPECS/httpd.spec");
        assert_eq!(tarball.tree_path(), "SOURCES/httpd-2.4.37.tar.bz2");
    }

    #[test]
    fn import_name_is_the_file_name() {
        let importer = SrpmImporter::new("/srv/srpms/httpd-2.4.37-21.el8.src.rpm").unwrap();
        assert_eq!(importer.file_name(), "httpd-2.4.37-21.el8.src.rpm");
    }

    #[test]
    fn unreadable_rpm_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken-1.0-1.el8.src.rpm");
        fs::write(&path, b"not an rpm").unwrap();
        let importer = SrpmImporter::new(&path).unwrap();
        assert!(matches!(importer.read_package(), Err(ImportError::Rpm { .. })));
    }
}
