//! directives::files
//!
//! Whole-file directives: replace, delete and add.

use std::fs;

use tracing::info;

use super::{
    AddDirective, DeleteDirective, DirectiveContext, DirectiveError, ErrorCode, ReplaceDirective,
    ReplaceWith,
};
use crate::core::paths::{base_name, with_sources_prefix, SOURCES_DIR, SPECS_DIR};
use crate::core::tree::{file_mode, set_file_mode};

/// Swap the content of an existing push-tree file, keeping its mode.
pub(super) fn replace(
    ctx: &mut DirectiveContext<'_>,
    directive: &ReplaceDirective,
) -> Result<(), DirectiveError> {
    let rel = with_sources_prefix(&directive.file);
    let target = ctx.push_tree.join(&rel);

    let mode = match fs::metadata(&target) {
        Ok(meta) if !directive.file.is_empty() && meta.is_file() => file_mode(&target)
            .map_err(|_| DirectiveError::new(ErrorCode::InvalidFile, &rel))?,
        _ => return Err(DirectiveError::new(ErrorCode::InvalidFile, &rel)),
    };

    // Read the new content first so a bad source leaves the target alone.
    let (contents, write_code) = match &directive.with {
        ReplaceWith::File(from) => {
            let source = ctx.patch_tree.join(from);
            let bytes = fs::read(&source)
                .map_err(|_| DirectiveError::new(ErrorCode::CouldNotReadReplacing, from))?;
            (bytes, ErrorCode::CouldNotWriteReplacing)
        }
        ReplaceWith::Inline(text) => (text.clone().into_bytes(), ErrorCode::CouldNotWriteInline),
    };

    fs::remove_file(&target)
        .map_err(|_| DirectiveError::new(ErrorCode::CouldNotRemoveOldFile, &rel))?;
    fs::write(&target, contents).map_err(|_| DirectiveError::new(write_code, &rel))?;
    set_file_mode(&target, mode).map_err(|_| DirectiveError::new(write_code, &rel))?;

    info!(file = %rel, "replaced file");
    Ok(())
}

/// Remove a push-tree file. The path is taken as given.
pub(super) fn delete(
    ctx: &mut DirectiveContext<'_>,
    directive: &DeleteDirective,
) -> Result<(), DirectiveError> {
    let target = ctx.push_tree.join(&directive.file);
    if !target.exists() {
        return Err(DirectiveError::new(
            ErrorCode::FileDoesNotExist,
            &directive.file,
        ));
    }

    let removed = if target.is_dir() {
        fs::remove_dir_all(&target)
    } else {
        fs::remove_file(&target)
    };
    removed.map_err(|_| DirectiveError::new(ErrorCode::CouldNotDeleteFile, &directive.file))?;

    info!(file = %directive.file, "deleted file");
    Ok(())
}

/// Copy a patch-tree file into `SOURCES/`, or `SPECS/` for spec paths.
pub(super) fn add(
    ctx: &mut DirectiveContext<'_>,
    directive: &AddDirective,
) -> Result<(), DirectiveError> {
    let source = ctx.patch_tree.join(&directive.file);
    let bytes = fs::read(&source)
        .map_err(|_| DirectiveError::new(ErrorCode::CouldNotReadFrom, &directive.file))?;

    let name = base_name(&directive.file);
    let dir = if directive.file.starts_with("SPECS/") {
        SPECS_DIR
    } else {
        SOURCES_DIR
    };
    let rel = format!("{dir}/{name}");
    let target = ctx.push_tree.join(&rel);

    let written = target
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&target, bytes));
    written.map_err(|_| DirectiveError::new(ErrorCode::CouldNotWriteDestination, &rel))?;

    info!(from = %directive.file, to = %rel, "added file");
    Ok(())
}
