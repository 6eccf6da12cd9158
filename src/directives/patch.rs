//! directives::patch
//!
//! Unified diff application.
//!
//! A diff may touch several files. It is split into one section per file
//! (the `---`/`+++` header plus its hunks), and each section is applied
//! with `diffy`. Every section is applied in memory first; the tree is
//! only written once the whole diff applies.

use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use super::{DirectiveContext, DirectiveError, ErrorCode, PatchDirective};
use crate::core::paths::with_sources_prefix;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,(\d+))? \+\d+(?:,(\d+))? @@").expect("hunk header pattern is valid")
});

/// What a diff section does to its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileChange {
    Added { path: String },
    Deleted { path: String },
    Modified { old: String, new: String },
}

/// The diff of a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilePatch {
    pub change: FileChange,
    /// Header and hunks in a form `diffy` accepts
    pub text: String,
}

/// Split a unified diff into per-file sections.
///
/// Lines outside a `---`/`+++` header and its hunks (commit messages,
/// `diff --git`, `index` lines) are ignored.
pub(crate) fn split_patch(diff: &str) -> Result<Vec<FilePatch>, String> {
    let lines: Vec<&str> = diff.split_inclusive('\n').collect();
    let mut files = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let is_header = lines[i].starts_with("--- ")
            && lines.get(i + 1).is_some_and(|l| l.starts_with("+++ "));
        if !is_header {
            i += 1;
            continue;
        }

        let old = file_name(&lines[i][4..]);
        let new = file_name(&lines[i + 1][4..]);
        let mut text = format!("{}{}", lines[i], lines[i + 1]);
        i += 2;

        let mut hunks = 0;
        while i < lines.len() && lines[i].starts_with("@@") {
            let caps = HUNK_HEADER
                .captures(lines[i])
                .ok_or_else(|| format!("malformed hunk header '{}'", lines[i].trim_end()))?;
            let count = |n: usize| {
                caps.get(n)
                    .map_or(Ok(1), |m| m.as_str().parse::<usize>())
                    .map_err(|e| e.to_string())
            };
            let (mut old_left, mut new_left) = (count(1)?, count(2)?);
            text.push_str(lines[i]);
            i += 1;
            hunks += 1;

            while (old_left > 0 || new_left > 0) && i < lines.len() {
                let line = lines[i];
                match line.as_bytes().first() {
                    Some(b' ') => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                        text.push_str(line);
                    }
                    Some(b'-') => {
                        old_left = old_left.saturating_sub(1);
                        text.push_str(line);
                    }
                    Some(b'+') => {
                        new_left = new_left.saturating_sub(1);
                        text.push_str(line);
                    }
                    Some(b'\\') => text.push_str(line),
                    // Context lines that lost their leading space
                    Some(b'\n') | Some(b'\r') => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                        text.push(' ');
                        text.push_str(line);
                    }
                    _ => return Err(format!("unexpected line in hunk: '{}'", line.trim_end())),
                }
                i += 1;
            }
            if old_left > 0 || new_left > 0 {
                return Err("diff ends inside a hunk".to_string());
            }
            while i < lines.len() && lines[i].starts_with('\\') {
                text.push_str(lines[i]);
                i += 1;
            }
        }

        if hunks == 0 {
            return Err(format!(
                "no hunks for '{}'",
                new.as_deref().or(old.as_deref()).unwrap_or("/dev/null")
            ));
        }

        let change = match (old, new) {
            (None, Some(path)) => FileChange::Added { path },
            (Some(path), None) => FileChange::Deleted { path },
            (Some(old), Some(new)) => FileChange::Modified { old, new },
            (None, None) => return Err("diff between /dev/null and /dev/null".to_string()),
        };
        files.push(FilePatch { change, text });
    }

    if files.is_empty() {
        return Err("no file changes found".to_string());
    }
    Ok(files)
}

/// Name from a `---`/`+++` header, `None` for `/dev/null`.
fn file_name(header: &str) -> Option<String> {
    let name = header.trim_end_matches(['\n', '\r']);
    let name = name.split('\t').next().unwrap_or(name).trim();
    if name == "/dev/null" {
        return None;
    }
    let name = name
        .strip_prefix("a/")
        .or_else(|| name.strip_prefix("b/"))
        .unwrap_or(name);
    Some(name.to_string())
}

/// A planned tree update.
#[derive(Debug)]
enum Update {
    Write {
        path: String,
        contents: String,
        replaces: Option<String>,
    },
    Remove {
        path: String,
    },
}

/// Apply a patch directive to the push tree and stage the result.
pub(super) fn apply(
    ctx: &mut DirectiveContext<'_>,
    directive: &PatchDirective,
) -> Result<(), DirectiveError> {
    let diff = fs::read_to_string(ctx.patch_tree.join(&directive.file))
        .map_err(|_| DirectiveError::new(ErrorCode::CouldNotOpenPatchFile, &directive.file))?;
    let sections = split_patch(&diff).map_err(|message| {
        debug!(file = %directive.file, %message, "could not parse patch");
        DirectiveError::new(ErrorCode::CouldNotParsePatchFile, &directive.file)
    })?;

    let target = |name: &str| {
        if directive.strict {
            name.to_string()
        } else {
            with_sources_prefix(name)
        }
    };

    let mut updates = Vec::new();
    for section in &sections {
        let parsed = diffy::Patch::from_str(&section.text)
            .map_err(|_| DirectiveError::new(ErrorCode::CouldNotParsePatchFile, &directive.file))?;

        match &section.change {
            FileChange::Added { path } => {
                let path = target(path);
                let contents = diffy::apply("", &parsed).map_err(|_| {
                    DirectiveError::new(ErrorCode::CouldNotApplyPatchToNewFile, &path)
                })?;
                updates.push(Update::Write {
                    path,
                    contents,
                    replaces: None,
                });
            }
            FileChange::Modified { old, new } => {
                let subject = target(old);
                let base = fs::read_to_string(ctx.push_tree.join(&subject)).map_err(|_| {
                    DirectiveError::new(ErrorCode::CouldNotOpenPatchSubject, &subject)
                })?;
                let contents = diffy::apply(&base, &parsed).map_err(|_| {
                    DirectiveError::new(ErrorCode::CouldNotApplyPatchWithSubject, &subject)
                })?;
                let path = target(new);
                let replaces = (path != subject).then_some(subject);
                updates.push(Update::Write {
                    path,
                    contents,
                    replaces,
                });
            }
            FileChange::Deleted { path } => updates.push(Update::Remove { path: target(path) }),
        }
    }

    for update in updates {
        match update {
            Update::Write {
                path,
                contents,
                replaces,
            } => {
                if let Some(old) = &replaces {
                    let _ = fs::remove_file(ctx.push_tree.join(old));
                    ctx.push.remove_path(old).map_err(|_| {
                        DirectiveError::new(ErrorCode::CouldNotRemoveFileFromGit, old)
                    })?;
                }
                let full = ctx.push_tree.join(&path);
                let _ = fs::remove_file(&full);
                full.parent()
                    .map_or(Ok(()), fs::create_dir_all)
                    .and_then(|()| fs::write(&full, contents))
                    .map_err(|_| {
                        DirectiveError::new(ErrorCode::CouldNotWritePostPatchFile, &path)
                    })?;
                ctx.push
                    .stage_path(&path)
                    .map_err(|_| DirectiveError::new(ErrorCode::CouldNotAddFileToGit, &path))?;
                debug!(file = %path, "patched");
            }
            Update::Remove { path } => {
                let _ = fs::remove_file(ctx.push_tree.join(&path));
                ctx.push.remove_path(&path).map_err(|_| {
                    DirectiveError::new(ErrorCode::CouldNotRemoveFileFromGit, &path)
                })?;
                debug!(file = %path, "removed by patch");
            }
        }
    }

    info!(patch = %directive.file, files = sections.len(), "applied patch");
    Ok(())
}
