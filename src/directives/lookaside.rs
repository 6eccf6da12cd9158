//! directives::lookaside
//!
//! Move files into lookaside or expire pending entries.

use std::fs;

use tracing::info;

use super::{DirectiveContext, DirectiveError, ErrorCode, LookasideDirective};
use crate::core::paths::{base_name, with_sources_prefix};
use crate::core::tree::write_file;
use crate::lookaside::{ensure_gitignore, HashAlgorithm};

/// Apply one `[[lookaside]]` table. Every file is attempted.
pub(super) fn apply(
    ctx: &mut DirectiveContext<'_>,
    directive: &LookasideDirective,
) -> Result<(), Vec<DirectiveError>> {
    let mut errors = Vec::new();
    let mut moved = Vec::new();

    for file in &directive.file {
        let rel = if directive.from_patch_tree {
            let rel = with_sources_prefix(base_name(file));
            let copied = fs::read(ctx.patch_tree.join(file))
                .and_then(|bytes| write_file(ctx.push_tree, &rel, &bytes));
            if copied.is_err() {
                errors.push(DirectiveError::new(ErrorCode::CouldNotCopyLookasideFile, file));
                continue;
            }
            rel
        } else {
            with_sources_prefix(file)
        };

        if !ctx.push_tree.join(&rel).is_file() {
            errors.push(DirectiveError::new(ErrorCode::LookasideFileDoesNotExist, &rel));
            continue;
        }
        ctx.lookaside.track(rel.clone(), HashAlgorithm::Sha256);
        moved.push(rel);
    }

    if !moved.is_empty() {
        if let Err(e) = ensure_gitignore(ctx.push_tree, moved.iter().map(String::as_str)) {
            errors.push(DirectiveError::new(ErrorCode::CouldNotUpdateGitignore, e.to_string()));
        }
        info!(files = ?moved, "moved into lookaside");
    }

    for file in &directive.expire {
        let rel = with_sources_prefix(file);
        if ctx.lookaside.expire(&rel) {
            info!(file = %rel, "expired lookaside entry");
        } else {
            errors.push(DirectiveError::new(ErrorCode::NotALookasideFile, &rel));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Git;
    use crate::lookaside::LookasideList;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn with_ctx<T>(
        patch: &TempDir,
        push: &TempDir,
        lookaside: &mut LookasideList,
        f: impl FnOnce(&mut DirectiveContext<'_>) -> T,
    ) -> T {
        let git = Git::init(push.path()).unwrap();
        let mut ctx = DirectiveContext {
            patch_tree: patch.path(),
            push_tree: push.path(),
            push: &git,
            lookaside,
            changelog_version: None,
            today: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
        };
        f(&mut ctx)
    }

    #[test]
    fn moves_push_tree_file_into_lookaside() {
        let patch = TempDir::new().unwrap();
        let push = TempDir::new().unwrap();
        write_file(push.path(), "SOURCES/assets.zip", b"zip").unwrap();
        let mut lookaside = LookasideList::new();

        let directive = LookasideDirective {
            file: vec!["assets.zip".into()],
            ..Default::default()
        };
        with_ctx(&patch, &push, &mut lookaside, |ctx| apply(ctx, &directive)).unwrap();

        assert!(lookaside.is_live("SOURCES/assets.zip"));
        assert_eq!(
            fs::read_to_string(push.path().join(".gitignore")).unwrap(),
            "SOURCES/assets.zip\n"
        );
    }

    #[test]
    fn copies_from_patch_tree() {
        let patch = TempDir::new().unwrap();
        let push = TempDir::new().unwrap();
        write_file(patch.path(), "ROCKY/SOURCES/logos.tar.xz", b"logos").unwrap();
        let mut lookaside = LookasideList::new();

        let directive = LookasideDirective {
            file: vec!["ROCKY/SOURCES/logos.tar.xz".into()],
            from_patch_tree: true,
            expire: vec![],
        };
        with_ctx(&patch, &push, &mut lookaside, |ctx| apply(ctx, &directive)).unwrap();

        assert_eq!(
            fs::read(push.path().join("SOURCES/logos.tar.xz")).unwrap(),
            b"logos"
        );
        assert!(lookaside.is_live("SOURCES/logos.tar.xz"));
    }

    #[test]
    fn expires_tracked_and_reports_unknown() {
        let patch = TempDir::new().unwrap();
        let push = TempDir::new().unwrap();
        let mut lookaside = LookasideList::new();
        lookaside.track("SOURCES/old.tar.gz", HashAlgorithm::Sha256);

        let directive = LookasideDirective {
            expire: vec!["old.tar.gz".into(), "SOURCES/never.tar".into()],
            ..Default::default()
        };
        let errors =
            with_ctx(&patch, &push, &mut lookaside, |ctx| apply(ctx, &directive)).unwrap_err();

        assert!(!lookaside.is_live("SOURCES/old.tar.gz"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code_string(), "NOT_A_LOOKASIDE_FILE:SOURCES/never.tar");
    }

    #[test]
    fn missing_file_is_collected() {
        let patch = TempDir::new().unwrap();
        let push = TempDir::new().unwrap();
        let mut lookaside = LookasideList::new();

        let directive = LookasideDirective {
            file: vec!["a.tar".into(), "b.tar".into()],
            ..Default::default()
        };
        let errors =
            with_ctx(&patch, &push, &mut lookaside, |ctx| apply(ctx, &directive)).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(lookaside.is_empty());
    }
}
