//! module
//!
//! Rewriting of module metadata so that every RPM component points at the
//! downstream import of that component.
//!
//! # Flow
//!
//! 1. Read `SOURCES/modulemd.src.txt`
//! 2. Map each component `ref` to a downstream push branch
//!    ([`component_branch`])
//! 3. Record those branch names in `SOURCES/modulemd.src.txt`
//! 4. Resolve each branch to its tip commit in the component repository
//!    ([`TipResolver`], retried with a fixed delay)
//! 5. Write `<module>.yaml` at the tree root with the resolved refs and
//!    https repository URLs for escaped component names, and stage it
//!
//! Trees carrying `platform.yaml` are left untouched.
//!
//! Unknown modulemd keys are carried through unchanged.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::naming::{gitlabify, repo_url, RepoKind};
use crate::git::{Git, GitAuth, GitError, RefEntry};

/// Module source metadata, relative to the tree root.
pub const MODULEMD_SOURCE: &str = "SOURCES/modulemd.src.txt";

const PLATFORM_YAML: &str = "platform.yaml";

/// Errors from module metadata rewriting.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed modulemd: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("modulemd has no data.components.rpms mapping")]
    NoComponents,

    #[error("could not recognize modulemd ref '{reference}' of component {component}")]
    UnknownRef { component: String, reference: String },

    #[error(
        "could not list refs of {component} after {attempts} attempts, import the rpm before the module: {message}"
    )]
    ComponentMissing {
        component: String,
        attempts: u32,
        message: String,
    },

    #[error("could not find tip hash of {component} for branch {branch}")]
    TipNotFound { component: String, branch: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

// =============================================================================
// Tip Resolution
// =============================================================================

/// Lists the refs of an already imported component repository.
pub trait TipResolver {
    fn list_refs(&self, component: &str) -> Result<Vec<RefEntry>, GitError>;
}

/// Lists refs of `<upstream prefix>/rpms/<component>.git`.
#[derive(Debug, Clone)]
pub struct RemoteTipResolver {
    upstream_prefix: String,
    auth: GitAuth,
}

impl RemoteTipResolver {
    pub fn new(upstream_prefix: impl Into<String>, auth: GitAuth) -> Self {
        Self {
            upstream_prefix: upstream_prefix.into(),
            auth,
        }
    }
}

impl TipResolver for RemoteTipResolver {
    fn list_refs(&self, component: &str) -> Result<Vec<RefEntry>, GitError> {
        Git::list_remote(
            &repo_url(&self.upstream_prefix, RepoKind::Rpms, component),
            &self.auth,
        )
    }
}

/// Bounded retry with a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

fn list_with_retry(
    resolver: &dyn TipResolver,
    component: &str,
    retry: RetryPolicy,
) -> Result<Vec<RefEntry>, ModuleError> {
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match resolver.list_refs(component) {
            Ok(refs) => return Ok(refs),
            Err(e) if attempt < attempts => {
                warn!(component, attempt, error = %e, "could not list component refs, retrying");
                thread::sleep(retry.delay);
                attempt += 1;
            }
            Err(e) => {
                return Err(ModuleError::ComponentMissing {
                    component: component.to_string(),
                    attempts,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Pick the tip commit for `branch` among a component's refs.
///
/// Tried in order: heads under `branch` (a `v` before a stream version is
/// dropped), heads under the module's own push branch, any ref outside a
/// stream. Within a rule an exact name wins over the last prefix match.
fn select_tip<'r>(refs: &'r [RefEntry], branch: &str, module_branch: &str) -> Option<&'r RefEntry> {
    let mut wanted = format!("refs/heads/{branch}");
    let parts: Vec<&str> = branch.split('-').collect();
    if let [_, _, version] = parts.as_slice() {
        if let Some(bare) = version.strip_prefix('v') {
            wanted = wanted.replacen(version, bare, 1);
        }
    }
    let fallback = format!("refs/heads/{module_branch}");

    under(refs, &wanted)
        .or_else(|| under(refs, &fallback))
        .or_else(|| refs.iter().filter(|r| !r.name.as_str().contains("stream")).last())
}

fn under<'r>(refs: &'r [RefEntry], prefix: &str) -> Option<&'r RefEntry> {
    refs.iter()
        .find(|r| r.name.as_str() == prefix)
        .or_else(|| refs.iter().filter(|r| r.name.as_str().starts_with(prefix)).last())
}

// =============================================================================
// Ref Mapping
// =============================================================================

/// Naming inputs for component branches.
#[derive(Debug, Clone)]
pub struct ModuleSettings {
    pub module: String,
    pub branch_prefix: String,
    pub version: u32,
    /// Push branch of the module itself
    pub push_branch: String,
    /// `https://host/path` form of the upstream prefix
    pub https_prefix: String,
    /// Record branch names instead of resolving tip commits
    pub branch_names_only: bool,
    pub retry: RetryPolicy,
}

fn first_char(part: Option<&&str>) -> Option<char> {
    part.and_then(|p| p.chars().next())
}

/// Downstream push branch for a component `ref`.
///
/// # Example
///
/// ```
/// use distmirror::module::{component_branch, ModuleSettings, RetryPolicy};
///
/// let settings = ModuleSettings {
///     module: "ant".into(),
///     branch_prefix: "r".into(),
///     version: 8,
///     push_branch: "r8-stream-1.10".into(),
///     https_prefix: "https://git.example.org/staging".into(),
///     branch_names_only: false,
///     retry: RetryPolicy::default(),
/// };
/// assert_eq!(component_branch("stream-ant-1.10", &settings).as_deref(), Some("r8-stream-1.10"));
/// assert_eq!(component_branch("rhel-8.2.0", &settings).as_deref(), Some("r8-stream-1.10"));
/// assert_eq!(component_branch("master", &settings), None);
/// ```
pub fn component_branch(reference: &str, settings: &ModuleSettings) -> Option<String> {
    let split: Vec<&str> = reference.split('-').collect();
    let bp = &settings.branch_prefix;

    if reference.starts_with("stream-rhel-") {
        let major = first_char(split.get(4))?;
        return Some(settings.push_branch.replacen(
            &format!("{bp}{major}s-"),
            &format!("{bp}{major}-"),
            1,
        ));
    }
    if reference.starts_with("stream-") {
        return match split.len() {
            2 => Some(settings.push_branch.clone()),
            3 => Some(format!("{bp}{}-stream-{}", settings.version, split[2])),
            _ => {
                let major = first_char(split.get(3))?;
                Some(format!("{bp}{major}-stream-{}", split[1]))
            }
        };
    }
    if reference.starts_with("rhel-") {
        return Some(settings.push_branch.clone());
    }
    None
}

// =============================================================================
// Modulemd Rewriting
// =============================================================================

fn components_mut(doc: &mut Value) -> Option<&mut Mapping> {
    doc.get_mut("data")?
        .get_mut("components")?
        .get_mut("rpms")?
        .as_mapping_mut()
}

fn set_key(component: &mut Value, key: &str, value: String) {
    if let Some(map) = component.as_mapping_mut() {
        map.insert(Value::String(key.to_string()), Value::String(value));
    }
}

fn read(path: &Path) -> Result<String, ModuleError> {
    fs::read_to_string(path).map_err(|source| ModuleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_yaml(path: &Path, doc: &Value) -> Result<(), ModuleError> {
    let contents = serde_yaml::to_string(doc)?;
    fs::write(path, contents).map_err(|source| ModuleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrite the module metadata in `tree` and stage the root document.
///
/// Returns `false` when the tree carries `platform.yaml` and was left
/// alone.
pub fn patch_module_yaml(
    tree: &Path,
    settings: &ModuleSettings,
    resolver: &dyn TipResolver,
    dest: &Git,
) -> Result<bool, ModuleError> {
    if tree.join(PLATFORM_YAML).exists() {
        info!("platform module, leaving metadata alone");
        return Ok(false);
    }

    let source_path = tree.join(MODULEMD_SOURCE);
    let mut doc: Value = serde_yaml::from_str(&read(&source_path)?)?;
    let mut branches = Vec::new();
    {
        let components = components_mut(&mut doc).ok_or(ModuleError::NoComponents)?;
        for (name, component) in components.iter_mut() {
            let name = name.as_str().unwrap_or_default().to_string();
            let reference = component
                .get("ref")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let branch = component_branch(&reference, settings).ok_or_else(|| {
                ModuleError::UnknownRef {
                    component: name.clone(),
                    reference: reference.clone(),
                }
            })?;
            debug!(component = %name, %reference, %branch, "mapped component ref");
            set_key(component, "ref", branch.clone());
            branches.push((name, branch));
        }
    }
    write_yaml(&source_path, &doc)?;

    let components = components_mut(&mut doc).ok_or(ModuleError::NoComponents)?;
    for (name, branch) in &branches {
        let Some(component) = components.get_mut(name.as_str()) else {
            continue;
        };

        if !settings.branch_names_only {
            let refs = list_with_retry(resolver, name, settings.retry)?;
            let tip = select_tip(&refs, branch, &settings.push_branch).ok_or_else(|| {
                ModuleError::TipNotFound {
                    component: name.clone(),
                    branch: branch.clone(),
                }
            })?;
            info!(component = %name, %branch, tip = %tip.oid, "resolved component tip");
            set_key(component, "ref", tip.oid.to_string());
        }

        let escaped = gitlabify(name);
        if escaped != *name {
            set_key(
                component,
                "repository",
                format!(
                    "{}/rpms/{escaped}.git",
                    settings.https_prefix.trim_end_matches('/')
                ),
            );
        }
    }

    let root_name = format!("{}.yaml", settings.module);
    write_yaml(&tree.join(&root_name), &doc)?;
    dest.stage_path(&root_name)?;
    info!(file = %root_name, components = branches.len(), "wrote module metadata");
    Ok(true)
}
