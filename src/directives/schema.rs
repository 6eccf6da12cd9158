//! directives::schema
//!
//! TOML schema of a directive `.cfg` file.
//!
//! Tables that name mutually exclusive options (`with_file` or
//! `with_inline`, one search-and-replace selector) are validated while
//! deserializing, so a loaded [`DirectiveSet`] only holds well-formed
//! directives.

use serde::Deserialize;

/// All directives of one `.cfg` file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DirectiveSet {
    pub replace: Vec<ReplaceDirective>,
    pub delete: Vec<DeleteDirective>,
    pub add: Vec<AddDirective>,
    pub patch: Vec<PatchDirective>,
    pub lookaside: Vec<LookasideDirective>,
    pub spec_change: Option<SpecChange>,
}

/// Where replacement content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceWith {
    /// A file in the patch tree
    File(String),
    /// Literal content
    Inline(String),
}

/// Replace a file of the push tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ReplaceToml")]
pub struct ReplaceDirective {
    pub file: String,
    pub with: ReplaceWith,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplaceToml {
    file: String,
    with_file: Option<String>,
    with_inline: Option<String>,
}

impl TryFrom<ReplaceToml> for ReplaceDirective {
    type Error = String;

    fn try_from(raw: ReplaceToml) -> Result<Self, Self::Error> {
        let with = match (raw.with_file, raw.with_inline) {
            (Some(path), None) => ReplaceWith::File(path),
            (None, Some(text)) => ReplaceWith::Inline(text),
            _ => {
                return Err(format!(
                    "replace of '{}' needs exactly one of with_file or with_inline",
                    raw.file
                ))
            }
        };
        Ok(Self {
            file: raw.file,
            with,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteDirective {
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddDirective {
    /// Path in the patch tree
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchDirective {
    /// Unified diff in the patch tree
    pub file: String,
    /// Use diff paths as-is instead of routing them into `SOURCES/`
    #[serde(default)]
    pub strict: bool,
}

/// Adjust the pending lookaside list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookasideDirective {
    /// Files to move into lookaside
    pub file: Vec<String>,
    /// Copy `file` entries from the patch tree first
    pub from_patch_tree: bool,
    /// Pending entries to drop
    pub expire: Vec<String>,
}

/// Structured rewrite of the spec file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecChange {
    pub file: Vec<FileOperation>,
    pub changelog: Vec<ChangelogEntry>,
    pub search_and_replace: Vec<SearchAndReplace>,
    pub append: Vec<AppendOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Source,
    Patch,
}

impl FileKind {
    /// Spec field prefix for this kind.
    pub fn field(self) -> &'static str {
        match self {
            FileKind::Source => "Source",
            FileKind::Patch => "Patch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    Add,
    Delete,
}

/// Add or drop a `SourceN`/`PatchN` line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileOperation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub mode: FileMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangelogEntry {
    pub author_name: String,
    pub author_email: String,
    #[serde(default)]
    pub message: Vec<String>,
}

/// Which lines a search-and-replace rule looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every line
    Any,
    /// Lines whose trimmed text starts with `find`
    StartsWith,
    /// Lines whose trimmed text ends with `find`
    EndsWith,
    /// The value of this field only
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "SearchAndReplaceToml")]
pub struct SearchAndReplace {
    pub selector: Selector,
    pub find: String,
    pub replace: String,
    /// Maximum replacements per line; negative means all
    pub n: i64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchAndReplaceToml {
    #[serde(default)]
    any: bool,
    #[serde(default)]
    starts_with: bool,
    #[serde(default)]
    ends_with: bool,
    field: Option<String>,
    find: String,
    #[serde(default)]
    replace: String,
    #[serde(default = "all_occurrences")]
    n: i64,
}

fn all_occurrences() -> i64 {
    -1
}

impl TryFrom<SearchAndReplaceToml> for SearchAndReplace {
    type Error = String;

    fn try_from(raw: SearchAndReplaceToml) -> Result<Self, Self::Error> {
        let mut selectors = Vec::new();
        if raw.any {
            selectors.push(Selector::Any);
        }
        if raw.starts_with {
            selectors.push(Selector::StartsWith);
        }
        if raw.ends_with {
            selectors.push(Selector::EndsWith);
        }
        if let Some(field) = raw.field {
            selectors.push(Selector::Field(field));
        }

        if selectors.len() != 1 {
            return Err(format!(
                "search_and_replace of '{}' needs exactly one of any, starts_with, ends_with or field",
                raw.find
            ));
        }

        Ok(Self {
            selector: selectors.remove(0),
            find: raw.find,
            replace: raw.replace,
            n: raw.n,
        })
    }
}

impl SearchAndReplace {
    /// Replace up to `n` occurrences in `s`.
    pub fn apply_to(&self, s: &str) -> String {
        if self.find.is_empty() {
            return s.to_string();
        }
        if self.n < 0 {
            s.replace(&self.find, &self.replace)
        } else {
            s.replacen(&self.find, &self.replace, self.n as usize)
        }
    }
}

/// Append to a field value or to a `%section`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppendOperation {
    pub field: String,
    pub value: String,
}
