//! import command - Mirror a package or module into the downstream forge

use anyhow::{Context as _, Result};
use std::path::Path;
use tracing::debug;

use crate::cli::args::ImportArgs;
use crate::core::config::{ConfigFile, RunConfig};
use crate::engine;
use crate::ui::output;

/// Build the run config from the config file and flags, then import.
pub fn import(args: &ImportArgs, config_path: Option<&Path>) -> Result<()> {
    let config = build_config(args, config_path)?;
    let result = engine::run(&config)?;
    output::print_result(&result).context("could not write report")?;
    Ok(())
}

fn build_config(args: &ImportArgs, config_path: Option<&Path>) -> Result<RunConfig> {
    let file = match ConfigFile::load(config_path)? {
        Some((file, path)) => {
            debug!(path = %path.display(), "loaded config file");
            file
        }
        None => ConfigFile::default(),
    };

    let mut flags = args.config_overrides();
    let merged = file.clone().merge(flags.clone());
    if merged.basic_username.is_some() && merged.basic_password.is_none() {
        let password = rpassword::prompt_password("Basic auth password: ")
            .context("could not read basic auth password")?;
        flags.basic_password = Some(password);
    }

    let mut builder = RunConfig::builder(&args.source_rpm).apply(&file).apply(&flags);
    if let Some(tag) = &args.single_tag {
        builder = builder.single_tag(tag);
    }
    if let Some(pins) = &args.manual_commits {
        builder = builder.manual_commits(pins);
    }
    if let Some(version) = &args.package_version {
        builder = builder.package_version(version);
    }
    if let Some(release) = &args.package_release {
        builder = builder.package_release(release);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args() -> ImportArgs {
        ImportArgs {
            source_rpm: "httpd".into(),
            ..Default::default()
        }
    }

    #[test]
    fn flags_override_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "storage_addr = \"memory://\"\nversion = 9\nbranch_prefix = \"x\"\n",
        )
        .unwrap();

        let config = build_config(
            &ImportArgs {
                version: Some(10),
                single_tag: Some("imports/c10/httpd-2.4.57-1.el10".into()),
                ..args()
            },
            Some(&path),
        )
        .unwrap();
        assert_eq!(config.version, 10);
        assert_eq!(config.branch_prefix, "x");
        assert_eq!(
            config.single_tag.as_deref(),
            Some("imports/c10/httpd-2.4.57-1.el10")
        );
    }

    #[test]
    fn missing_storage_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "version = 8\n").unwrap();

        let err = build_config(&args(), Some(&path)).unwrap_err();
        assert!(err.to_string().contains("storage-addr"));
    }
}
