//! import::probe
//!
//! Derive a package NVR from a spec file for tagless imports.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::engine::ImportError;

/// Computes `name-version-release` for the spec in a staged tree.
pub trait VersionProbe {
    fn probe(&self, tree: &Path, spec: &Path) -> Result<String, ImportError>;
}

/// Asks `rpmspec` for the source package NVR.
///
/// `_topdir` points at the staged tree so `%{_sourcedir}` macros resolve
/// against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpmspecProbe;

impl VersionProbe for RpmspecProbe {
    fn probe(&self, tree: &Path, spec: &Path) -> Result<String, ImportError> {
        let output = Command::new("rpmspec")
            .arg("--define")
            .arg(format!("_topdir {}", tree.display()))
            .args(["-q", "--srpm", "--qf", "%{NAME}-%{VERSION}-%{RELEASE}\\n"])
            .arg(spec)
            .output()
            .map_err(|e| ImportError::Tool {
                tool: "rpmspec",
                message: format!("could not run (is rpm-build installed?): {e}"),
            })?;

        if !output.status.success() {
            return Err(ImportError::Tool {
                tool: "rpmspec",
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(output = %stdout.trim(), "rpmspec output");
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ImportError::Tool {
                tool: "rpmspec",
                message: "no output".into(),
            })
    }
}
