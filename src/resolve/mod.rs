//! resolve
//!
//! Mapping from upstream import refs to downstream push branches and
//! import tags.
//!
//! # Matching
//!
//! A single pattern is compiled per run:
//!
//! ```text
//! refs/tags/(imports/(<prefix><version><suffix><tail>)/(<nvr>))
//! ```
//!
//! where `<tail>` accepts any continuation (or `-stream-*` only in strict
//! mode) and `<nvr>` is `<name>-<version>-<release>`. Refs that do not
//! match are skipped, never failed.
//!
//! In module and tagless mode, upstream branches
//! (`refs/heads/<prefix><version>*`) are turned into a synthetic tag of the
//! form `refs/tags/imports/<branch>/<name>` before matching.
//!
//! # Example
//!
//! ```
//! use distmirror::resolve::{Resolution, Resolver, ResolverSettings};
//!
//! let resolver = Resolver::new(ResolverSettings::new("bash")).unwrap();
//! match resolver.resolve("refs/tags/imports/c8-stream-1.1/bash-4.4.20-1.el8") {
//!     Resolution::Import(r) => {
//!         assert_eq!(r.push_branch.as_str(), "r8-stream-1.1");
//!         assert_eq!(r.new_tag, "imports/r8-stream-1.1/bash-4.4.20-1.el8");
//!     }
//!     Resolution::Skip(reason) => panic!("unexpected skip: {reason}"),
//! }
//! ```

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::core::types::{BranchName, Oid};

/// Errors from building a resolver or a ref plan.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not compile import pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid manual commit '{0}', expected BRANCH:HASH")]
    InvalidManualCommit(String),
}

/// Inputs the import pattern is built from.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub package: String,
    pub version: u32,
    pub import_branch_prefix: String,
    pub branch_prefix: String,
    pub branch_suffix: Option<String>,
    pub strict_branch_mode: bool,
    pub module_mode: bool,
    pub tagless_mode: bool,
    pub package_version: Option<String>,
    pub package_release: Option<String>,
}

impl ResolverSettings {
    /// Settings with the stock `c` -> `r` prefixes for version 8.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: 8,
            import_branch_prefix: "c".to_string(),
            branch_prefix: "r".to_string(),
            branch_suffix: None,
            strict_branch_mode: false,
            module_mode: false,
            tagless_mode: false,
            package_version: None,
            package_release: None,
        }
    }

    /// `<importPrefix><version><suffix>`, the literal head of every
    /// matching branch.
    pub fn import_branch(&self) -> String {
        format!(
            "{}{}{}",
            self.import_branch_prefix,
            self.version,
            self.branch_suffix.as_deref().unwrap_or("")
        )
    }

    fn synthesizes_branches(&self) -> bool {
        self.module_mode || self.tagless_mode
    }
}

/// An upstream ref resolved to its downstream names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    /// The upstream ref as discovered (tag or branch)
    pub upstream_ref: String,
    /// Downstream branch to publish to
    pub push_branch: BranchName,
    /// Downstream import tag (without `refs/tags/`)
    pub new_tag: String,
    /// The NVR component of the matched tag
    pub nvr: String,
}

/// Why a ref was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Beta refs are never imported
    Beta,
    /// The ref does not match the import pattern
    NoMatch,
    /// The computed push branch is not a valid branch name
    InvalidBranch(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Beta => write!(f, "beta ref"),
            SkipReason::NoMatch => write!(f, "does not match import pattern"),
            SkipReason::InvalidBranch(msg) => write!(f, "invalid push branch: {msg}"),
        }
    }
}

/// Outcome of resolving a single ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Import(ResolvedRef),
    Skip(SkipReason),
}

/// Compiled import pattern plus the prefixes needed to rename matches.
#[derive(Debug, Clone)]
pub struct Resolver {
    settings: ResolverSettings,
    pattern: Regex,
    branch_only: Regex,
}

impl Resolver {
    /// Compile the import pattern.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Pattern` if the assembled pattern is invalid.
    pub fn new(settings: ResolverSettings) -> Result<Self, ResolveError> {
        let mut branch = regex::escape(&settings.import_branch());
        if settings.strict_branch_mode {
            branch.push_str("(?:-stream-.+|)");
        } else {
            branch.push_str("(?:.+|)");
        }

        let name = regex::escape(&settings.package);
        let version = settings
            .package_version
            .as_deref()
            .map(regex::escape)
            .unwrap_or_else(|| ".+".to_string());
        let release = settings
            .package_release
            .as_deref()
            .map(regex::escape)
            .unwrap_or_else(|| ".+".to_string());

        let nvr = if settings.synthesizes_branches()
            && settings.package_version.is_none()
            && settings.package_release.is_none()
        {
            format!("{name}(?:-.+-.+)?")
        } else {
            format!("{name}-{version}-{release}")
        };

        let pattern = Regex::new(&format!("(?i)^refs/tags/(imports/({branch})/({nvr}))$"))?;
        let branch_only = Regex::new(&format!("(?i)^refs/tags/(imports/({branch})/(.+))$"))?;
        debug!(pattern = %pattern, "compiled import pattern");

        Ok(Self {
            settings,
            pattern,
            branch_only,
        })
    }

    /// Settings the resolver was built from.
    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve a discovered upstream ref.
    pub fn resolve(&self, upstream_ref: &str) -> Resolution {
        self.resolve_with(upstream_ref, &self.pattern)
    }

    /// Resolve a synthesized manual-commit ref.
    ///
    /// Pins name a commit hash instead of an NVR, so only the branch part of
    /// the pattern applies.
    pub fn resolve_pinned(&self, upstream_ref: &str) -> Resolution {
        self.resolve_with(upstream_ref, &self.branch_only)
    }

    fn resolve_with(&self, upstream_ref: &str, pattern: &Regex) -> Resolution {
        if upstream_ref.contains("-beta") {
            return Resolution::Skip(SkipReason::Beta);
        }

        let match_string = if pattern.is_match(upstream_ref) {
            upstream_ref.to_string()
        } else {
            match self.synthesize(upstream_ref) {
                Some(s) if pattern.is_match(&s) => {
                    debug!(upstream_ref, match_string = %s, "using synthesized match string");
                    s
                }
                _ => return Resolution::Skip(SkipReason::NoMatch),
            }
        };

        let Some(caps) = pattern.captures(&match_string) else {
            return Resolution::Skip(SkipReason::NoMatch);
        };
        let full = &caps[1];
        let branch = &caps[2];
        let nvr = &caps[3];

        let prefix = &self.settings.import_branch_prefix;
        let push_branch = format!(
            "{}{}",
            self.settings.branch_prefix,
            strip_prefix_ci(branch, prefix)
        );
        let new_tag = format!(
            "imports/{}{}",
            self.settings.branch_prefix,
            strip_prefix_ci(full, &format!("imports/{prefix}"))
        )
        .replace('%', "_");

        match BranchName::new(push_branch) {
            Ok(push_branch) => Resolution::Import(ResolvedRef {
                upstream_ref: upstream_ref.to_string(),
                push_branch,
                new_tag,
                nvr: nvr.to_string(),
            }),
            Err(e) => Resolution::Skip(SkipReason::InvalidBranch(e.to_string())),
        }
    }

    /// Turn an upstream branch head into a synthetic import tag.
    fn synthesize(&self, upstream_ref: &str) -> Option<String> {
        if !self.settings.synthesizes_branches() {
            return None;
        }
        let head_prefix = format!(
            "refs/heads/{}{}",
            self.settings.import_branch_prefix, self.settings.version
        );
        if !upstream_ref.starts_with(&head_prefix) {
            return None;
        }
        let branch = upstream_ref.strip_prefix("refs/heads/")?;
        Some(format!(
            "refs/tags/imports/{branch}/{}",
            self.settings.package
        ))
    }

    /// Import tag for a tagless import once the NVR is known.
    pub fn tagless_tag(&self, push_branch: &BranchName, nvr: &str) -> String {
        format!("imports/{}/{}", push_branch, nvr).replace('%', "_")
    }
}

/// Case-insensitive `strip_prefix`, falling back to the input unchanged.
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

/// A `BRANCH:HASH` pin for a package with broken release tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualCommit {
    pub branch: String,
    pub hash: Oid,
}

impl ManualCommit {
    /// Parse `BRANCH:HASH`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidManualCommit` unless the input has
    /// exactly one `:` separating a non-empty branch from a full hash.
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let invalid = || ResolveError::InvalidManualCommit(input.to_string());
        let mut parts = input.trim().split(':');
        let (Some(branch), Some(hash), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        if branch.is_empty() {
            return Err(invalid());
        }
        let hash = Oid::new(hash).map_err(|_| invalid())?;
        Ok(Self {
            branch: branch.to_string(),
            hash,
        })
    }

    /// Parse a comma separated list of pins, ignoring blank input.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, ResolveError> {
        if input.trim().is_empty() {
            return Ok(Vec::new());
        }
        input.split(',').map(Self::parse).collect()
    }

    /// The synthesized upstream ref standing in for this pin.
    pub fn synthetic_ref(&self, package: &str) -> String {
        format!(
            "refs/tags/imports/{}/{}-{}",
            self.branch,
            package,
            self.hash.as_str()
        )
    }
}

/// Refs to import, in order, plus the pins consulted at checkout time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefPlan {
    pub refs: Vec<String>,
    /// Synthesized upstream ref -> pinned upstream commit
    pub pins: HashMap<String, Oid>,
}

impl RefPlan {
    /// Pick the refs to import.
    ///
    /// Precedence: a single tag override, then manual commit pins, then the
    /// full discovered list.
    pub fn select(
        package: &str,
        discovered: Vec<String>,
        single_tag: Option<&str>,
        manual_commits: &[ManualCommit],
    ) -> Self {
        if let Some(tag) = single_tag {
            return Self {
                refs: vec![format!("refs/tags/{tag}")],
                pins: HashMap::new(),
            };
        }

        if !manual_commits.is_empty() {
            let mut plan = Self::default();
            for pin in manual_commits {
                let head = pin.synthetic_ref(package);
                plan.pins.insert(head.clone(), pin.hash.clone());
                plan.refs.push(head);
            }
            return plan;
        }

        Self {
            refs: discovered,
            pins: HashMap::new(),
        }
    }

    /// The pinned commit for a ref, if any.
    pub fn pin_for(&self, upstream_ref: &str) -> Option<&Oid> {
        self.pins.get(upstream_ref)
    }

    /// Resolve a planned ref, honoring pins.
    pub fn resolve(&self, resolver: &Resolver, upstream_ref: &str) -> Resolution {
        if self.pins.contains_key(upstream_ref) {
            resolver.resolve_pinned(upstream_ref)
        } else {
            resolver.resolve(upstream_ref)
        }
    }
}
