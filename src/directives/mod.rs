//! directives
//!
//! Declarative edits applied from a patch repository onto the push tree.
//!
//! # Architecture
//!
//! A `.cfg` file deserializes into a [`DirectiveSet`]. [`DirectiveSet::directives`]
//! flattens it into closed [`Directive`] variants in the fixed application
//! order:
//!
//! 1. replace
//! 2. delete
//! 3. add
//! 4. patch
//! 5. lookaside
//! 6. spec_change
//!
//! Failures do not stop the run early. Every directive is attempted and
//! each failure is collected as a [`DirectiveError`], rendered for the
//! user as a `CODE:subject` string.

mod files;
mod lookaside;
mod patch;
mod schema;
pub mod spec;

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

pub use schema::{
    AddDirective, AppendOperation, ChangelogEntry, DeleteDirective, DirectiveSet, FileKind,
    FileMode, FileOperation, LookasideDirective, PatchDirective, ReplaceDirective, ReplaceWith,
    SearchAndReplace, Selector, SpecChange,
};
pub use spec::SpecRewriter;

use crate::git::Git;
use crate::lookaside::LookasideList;

/// Machine readable directive failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // replace
    InvalidFile,
    CouldNotRemoveOldFile,
    CouldNotReadReplacing,
    CouldNotWriteReplacing,
    CouldNotWriteInline,
    // delete
    FileDoesNotExist,
    CouldNotDeleteFile,
    // add
    CouldNotReadFrom,
    CouldNotWriteDestination,
    // patch
    CouldNotOpenPatchFile,
    CouldNotParsePatchFile,
    CouldNotOpenPatchSubject,
    CouldNotApplyPatchWithSubject,
    CouldNotApplyPatchToNewFile,
    CouldNotWritePostPatchFile,
    CouldNotAddFileToGit,
    CouldNotRemoveFileFromGit,
    // lookaside
    LookasideFileDoesNotExist,
    CouldNotCopyLookasideFile,
    NotALookasideFile,
    CouldNotUpdateGitignore,
    // spec_change
    CouldNotReadSpecsDir,
    OnlyOneSpecFileIsSupported,
    CouldNotReadSpecFile,
    CouldNotWriteSpecFile,
    InvalidSourceNum,
    InvalidPatchNum,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidFile => "INVALID_FILE",
            ErrorCode::CouldNotRemoveOldFile => "COULD_NOT_REMOVE_OLD_FILE",
            ErrorCode::CouldNotReadReplacing => "COULD_NOT_READ_REPLACING",
            ErrorCode::CouldNotWriteReplacing => "COULD_NOT_WRITE_REPLACING",
            ErrorCode::CouldNotWriteInline => "COULD_NOT_WRITE_INLINE",
            ErrorCode::FileDoesNotExist => "FILE_DOES_NOT_EXIST",
            ErrorCode::CouldNotDeleteFile => "COULD_NOT_DELETE_FILE",
            ErrorCode::CouldNotReadFrom => "COULD_NOT_READ_FROM",
            ErrorCode::CouldNotWriteDestination => "COULD_NOT_WRITE_DESTINATION",
            ErrorCode::CouldNotOpenPatchFile => "COULD_NOT_OPEN_PATCH_FILE",
            ErrorCode::CouldNotParsePatchFile => "COULD_NOT_PARSE_PATCH_FILE",
            ErrorCode::CouldNotOpenPatchSubject => "COULD_NOT_OPEN_PATCH_SUBJECT",
            ErrorCode::CouldNotApplyPatchWithSubject => "COULD_NOT_APPLY_PATCH_WITH_SUBJECT",
            ErrorCode::CouldNotApplyPatchToNewFile => "COULD_NOT_APPLY_PATCH_TO_NEW_FILE",
            ErrorCode::CouldNotWritePostPatchFile => "COULD_NOT_WRITE_POST_PATCH_FILE",
            ErrorCode::CouldNotAddFileToGit => "COULD_NOT_ADD_FILE_TO_GIT",
            ErrorCode::CouldNotRemoveFileFromGit => "COULD_NOT_REMOVE_FILE_FROM_GIT",
            ErrorCode::LookasideFileDoesNotExist => "LOOKASIDE_FILE_DOES_NOT_EXIST",
            ErrorCode::CouldNotCopyLookasideFile => "COULD_NOT_COPY_LOOKASIDE_FILE",
            ErrorCode::NotALookasideFile => "NOT_A_LOOKASIDE_FILE",
            ErrorCode::CouldNotUpdateGitignore => "COULD_NOT_UPDATE_GITIGNORE",
            ErrorCode::CouldNotReadSpecsDir => "COULD_NOT_READ_SPECS_DIR",
            ErrorCode::OnlyOneSpecFileIsSupported => "ONLY_ONE_SPEC_FILE_IS_SUPPORTED",
            ErrorCode::CouldNotReadSpecFile => "COULD_NOT_READ_SPEC_FILE",
            ErrorCode::CouldNotWriteSpecFile => "COULD_NOT_WRITE_SPEC_FILE",
            ErrorCode::InvalidSourceNum => "INVALID_SOURCE_NUM",
            ErrorCode::InvalidPatchNum => "INVALID_PATCH_NUM",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed directive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.code_string())]
pub struct DirectiveError {
    pub code: ErrorCode,
    /// File or field the failure is about
    pub subject: String,
}

impl DirectiveError {
    pub fn new(code: ErrorCode, subject: impl Into<String>) -> Self {
        Self {
            code,
            subject: subject.into(),
        }
    }

    /// `CODE:subject`, or just `CODE` without a subject.
    pub fn code_string(&self) -> String {
        if self.subject.is_empty() {
            self.code.as_str().to_string()
        } else {
            format!("{}:{}", self.code, self.subject)
        }
    }
}

/// Everything a directive may read or change.
pub struct DirectiveContext<'a> {
    /// Checked out patch repository
    pub patch_tree: &'a Path,
    /// Destination work tree
    pub push_tree: &'a Path,
    /// Destination repository, for index updates
    pub push: &'a Git,
    pub lookaside: &'a mut LookasideList,
    /// `<version>-<release>` used in changelog stanzas
    pub changelog_version: Option<String>,
    /// Date stamped on changelog stanzas
    pub today: NaiveDate,
}

impl fmt::Debug for DirectiveContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveContext")
            .field("patch_tree", &self.patch_tree)
            .field("push_tree", &self.push_tree)
            .field("lookaside", &self.lookaside.len())
            .field("changelog_version", &self.changelog_version)
            .field("today", &self.today)
            .finish()
    }
}

/// One directive, borrowed from its [`DirectiveSet`].
#[derive(Debug, Clone, Copy)]
pub enum Directive<'a> {
    Replace(&'a ReplaceDirective),
    Delete(&'a DeleteDirective),
    Add(&'a AddDirective),
    Patch(&'a PatchDirective),
    Lookaside(&'a LookasideDirective),
    SpecChange(&'a SpecChange),
}

impl Directive<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Replace(_) => "replace",
            Directive::Delete(_) => "delete",
            Directive::Add(_) => "add",
            Directive::Patch(_) => "patch",
            Directive::Lookaside(_) => "lookaside",
            Directive::SpecChange(_) => "spec_change",
        }
    }

    /// Apply this directive.
    ///
    /// Lookaside directives can fail on several files; every failure is
    /// returned.
    pub fn apply(&self, ctx: &mut DirectiveContext<'_>) -> Result<(), Vec<DirectiveError>> {
        match self {
            Directive::Replace(d) => files::replace(ctx, d).map_err(|e| vec![e]),
            Directive::Delete(d) => files::delete(ctx, d).map_err(|e| vec![e]),
            Directive::Add(d) => files::add(ctx, d).map_err(|e| vec![e]),
            Directive::Patch(d) => patch::apply(ctx, d).map_err(|e| vec![e]),
            Directive::Lookaside(d) => lookaside::apply(ctx, d),
            Directive::SpecChange(change) => {
                spec::apply_spec_change(ctx.push_tree, change, ctx.changelog_version.clone(), ctx.today)
                    .map_err(|e| vec![e])
            }
        }
    }
}

impl DirectiveSet {
    /// Parse a `.cfg` file.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// All directives in application order.
    pub fn directives(&self) -> Vec<Directive<'_>> {
        let mut out = Vec::new();
        out.extend(self.replace.iter().map(Directive::Replace));
        out.extend(self.delete.iter().map(Directive::Delete));
        out.extend(self.add.iter().map(Directive::Add));
        out.extend(self.patch.iter().map(Directive::Patch));
        out.extend(self.lookaside.iter().map(Directive::Lookaside));
        out.extend(self.spec_change.iter().map(Directive::SpecChange));
        out
    }

    /// Apply every directive, collecting failures.
    pub fn apply(&self, ctx: &mut DirectiveContext<'_>) -> Vec<DirectiveError> {
        let mut errors = Vec::new();
        for directive in self.directives() {
            debug!(kind = directive.kind(), "applying directive");
            if let Err(mut failed) = directive.apply(ctx) {
                errors.append(&mut failed);
            }
        }
        if errors.is_empty() {
            info!(count = self.directives().len(), "directives applied");
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_string_joins_code_and_subject() {
        let err = DirectiveError::new(ErrorCode::FileDoesNotExist, "SOURCES/a.patch");
        assert_eq!(err.code_string(), "FILE_DOES_NOT_EXIST:SOURCES/a.patch");
        assert_eq!(err.to_string(), "FILE_DOES_NOT_EXIST:SOURCES/a.patch");

        let bare = DirectiveError::new(ErrorCode::OnlyOneSpecFileIsSupported, "");
        assert_eq!(bare.code_string(), "ONLY_ONE_SPEC_FILE_IS_SUPPORTED");
    }

    #[test]
    fn directives_follow_fixed_order() {
        let set = DirectiveSet::parse(
            r#"
            [spec_change]

            [[lookaside]]
            expire = ["SOURCES/a.tar"]

            [[patch]]
            file = "p.patch"

            [[add]]
            file = "a"

            [[delete]]
            file = "d"

            [[replace]]
            file = "r"
            with_inline = "x"
            "#,
        )
        .unwrap();

        let kinds: Vec<_> = set.directives().iter().map(Directive::kind).collect();
        assert_eq!(
            kinds,
            vec!["replace", "delete", "add", "patch", "lookaside", "spec_change"]
        );
    }

    #[test]
    fn missing_spec_change_is_not_a_directive() {
        let set = DirectiveSet::parse("[[delete]]\nfile = \"d\"\n").unwrap();
        assert_eq!(set.directives().len(), 1);
    }
}
