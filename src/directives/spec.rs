//! directives::spec
//!
//! Line oriented rewriting of the package spec file.
//!
//! # Passes
//!
//! The first pass measures the file: the longest `Field:` name (values are
//! aligned to `longest + 8` columns), the last `Source*` and `Patch*`
//! fields, and their highest numbers.
//!
//! The second pass emits the file line by line:
//!
//! - search-and-replace rules run on every line; field-scoped rules and
//!   appends run on the matching field value
//! - a `SourceN`/`PatchN` line whose value a delete operation names is
//!   dropped
//! - once the last `Source*` (or `Patch*`) field has been emitted, the
//!   first line that is not another field of that kind closes the block
//!   and the added `SourceN`/`PatchN` lines are emitted before it
//! - changelog stanzas follow the `%changelog` header
//! - appends aimed at a `%section` are emitted before the next
//!   `%`-prefixed line, or the next blank line when there is none
//!
//! A missing Patch block is synthesized only when patches are added, and a
//! missing `%changelog` section only when there are stanzas to write, so a
//! rewrite without operations only realigns field values.

use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use super::{
    DirectiveError, ErrorCode, FileKind, FileMode, SearchAndReplace, Selector, SpecChange,
};
use crate::core::paths::SPECS_DIR;

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Za-z0-9_()-]*):(.*)$").expect("field pattern is valid")
});

const CHANGELOG: &str = "%changelog";

/// Split `Field: value` into its trimmed parts.
fn parse_field(line: &str) -> Option<(String, String)> {
    let caps = FIELD_LINE.captures(line)?;
    Some((caps[1].to_string(), caps[2].trim().to_string()))
}

fn kind_of(field: &str) -> Option<FileKind> {
    if field.starts_with("Source") {
        Some(FileKind::Source)
    } else if field.starts_with("Patch") {
        Some(FileKind::Patch)
    } else {
        None
    }
}

/// Number of a `SourceN`/`PatchN` field; a bare `Source` counts as 0.
fn field_number(field: &str, kind: FileKind) -> Result<u32, DirectiveError> {
    let digits = &field[kind.field().len()..];
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse().map_err(|_| {
        let code = match kind {
            FileKind::Source => ErrorCode::InvalidSourceNum,
            FileKind::Patch => ErrorCode::InvalidPatchNum,
        };
        DirectiveError::new(code, field)
    })
}

/// Measurements from the first pass.
#[derive(Debug, Default)]
struct Layout {
    longest: usize,
    last_source: Option<String>,
    last_patch: Option<String>,
    highest_source: Option<u32>,
    highest_patch: Option<u32>,
    has_patch: bool,
    has_changelog: bool,
}

impl Layout {
    fn measure(lines: &[&str]) -> Result<Self, DirectiveError> {
        let mut layout = Layout::default();
        for line in lines {
            if line.trim().starts_with(CHANGELOG) {
                layout.has_changelog = true;
            }
            let Some((field, _)) = parse_field(line) else {
                continue;
            };
            layout.longest = layout.longest.max(field.len());

            match kind_of(&field) {
                Some(FileKind::Source) => {
                    let n = field_number(&field, FileKind::Source)?;
                    layout.highest_source = Some(layout.highest_source.map_or(n, |h| h.max(n)));
                    layout.last_source = Some(field);
                }
                Some(FileKind::Patch) => {
                    let n = field_number(&field, FileKind::Patch)?;
                    layout.highest_patch = Some(layout.highest_patch.map_or(n, |h| h.max(n)));
                    layout.has_patch = true;
                    layout.last_patch = Some(field);
                }
                None => {}
            }
        }
        Ok(layout)
    }
}

/// Rewrites a spec file according to a [`SpecChange`].
#[derive(Debug, Clone)]
pub struct SpecRewriter<'a> {
    change: &'a SpecChange,
    version: Option<String>,
    today: NaiveDate,
}

impl<'a> SpecRewriter<'a> {
    /// `version` is the `<version>-<release>` for changelog stanzas; the
    /// spec's own `Version` field is used when it is `None`.
    pub fn new(change: &'a SpecChange, version: Option<String>, today: NaiveDate) -> Self {
        Self {
            change,
            version,
            today,
        }
    }

    /// Rewrite the contents of a spec file.
    pub fn rewrite(&self, input: &str) -> Result<String, DirectiveError> {
        let (body, trailing_newline) = match input.strip_suffix('\n') {
            Some(body) => (body, true),
            None => (input, false),
        };
        let lines: Vec<&str> = body.split('\n').collect();
        let layout = Layout::measure(&lines)?;

        let mut pass = Pass {
            rewriter: self,
            layout: &layout,
            out: Vec::with_capacity(lines.len()),
            in_sources: false,
            in_patches: false,
            next_source: layout.highest_source.map_or(0, |n| n + 1),
            next_patch: layout.highest_patch.map_or(0, |n| n + 1),
            version: self.version.clone(),
            queued: BTreeMap::new(),
            changelog_written: false,
        };

        for (index, line) in lines.iter().enumerate() {
            pass.line(index, line, &lines);
        }
        pass.finish(lines.len());

        let mut output = pass.out.join("\n");
        if trailing_newline {
            output.push('\n');
        }
        Ok(output)
    }

    fn file_ops(&self, kind: FileKind, mode: FileMode) -> impl Iterator<Item = &str> {
        self.change
            .file
            .iter()
            .filter(move |op| op.kind == kind && op.mode == mode)
            .map(|op| op.name.as_str())
    }

    /// Line-wide search-and-replace rules.
    fn replace_in_line(&self, line: &str) -> String {
        let mut line = line.to_string();
        for rule in &self.change.search_and_replace {
            let applies = match &rule.selector {
                Selector::Any => true,
                Selector::StartsWith => line.trim().starts_with(&rule.find),
                Selector::EndsWith => line.trim().ends_with(&rule.find),
                Selector::Field(_) => false,
            };
            if applies {
                line = rule.apply_to(&line);
            }
        }
        line
    }

    fn field_rules<'r>(&'r self, field: &'r str) -> impl Iterator<Item = &'r SearchAndReplace> {
        self.change
            .search_and_replace
            .iter()
            .filter(move |rule| matches!(&rule.selector, Selector::Field(f) if f == field))
    }
}

/// State of the second pass.
struct Pass<'r, 'a> {
    rewriter: &'r SpecRewriter<'a>,
    layout: &'r Layout,
    out: Vec<String>,
    in_sources: bool,
    in_patches: bool,
    next_source: u32,
    next_patch: u32,
    version: Option<String>,
    /// Section appends keyed by the input line they precede
    queued: BTreeMap<usize, Vec<String>>,
    changelog_written: bool,
}

impl Pass<'_, '_> {
    fn line(&mut self, index: usize, line: &str, lines: &[&str]) {
        if let Some(values) = self.queued.remove(&index) {
            self.out.extend(values);
        }

        let original = parse_field(line);
        let kind = original.as_ref().and_then(|(field, _)| kind_of(field));
        if self.in_sources && kind != Some(FileKind::Source) {
            self.close_sources();
        }
        if self.in_patches && kind != Some(FileKind::Patch) {
            self.close_patches();
        }

        let line = self.rewriter.replace_in_line(line);
        match (original, parse_field(&line)) {
            (Some((original_field, _)), Some((field, value))) => {
                if self.layout.last_source.as_deref() == Some(original_field.as_str()) {
                    self.in_sources = true;
                } else if self.layout.last_patch.as_deref() == Some(original_field.as_str()) {
                    self.in_patches = true;
                }
                self.field_line(field, value);
            }
            _ => self.plain_line(index, line, lines),
        }
    }

    fn field_line(&mut self, field: String, mut value: String) {
        if field == "Version" && self.version.is_none() {
            self.version = Some(value.clone());
        }

        for rule in self.rewriter.field_rules(&field) {
            value = rule.apply_to(&value);
        }
        for append in self.rewriter.change.append.iter().filter(|a| a.field == field) {
            value.push_str(&append.value);
            if field == "Release" {
                let mut version = self.version.take().unwrap_or_default();
                version.push_str(&append.value);
                self.version = Some(version);
            }
        }

        if let Some(kind) = kind_of(&field) {
            if self
                .rewriter
                .file_ops(kind, FileMode::Delete)
                .any(|name| name == value)
            {
                debug!(%field, %value, "dropping spec line");
                value.clear();
            }
        }

        if !value.is_empty() {
            let rendered = self.render(&field, &value);
            self.out.push(rendered);
        }
    }

    fn plain_line(&mut self, index: usize, line: String, lines: &[&str]) {
        let trimmed = line.trim().to_string();
        if trimmed.starts_with('%') {
            self.queue_section_appends(index, &trimmed, lines);
        }
        self.out.push(line);

        if trimmed.starts_with(CHANGELOG) && !self.changelog_written {
            self.write_changelog();
        }
    }

    fn queue_section_appends(&mut self, index: usize, section: &str, lines: &[&str]) {
        let values: Vec<String> = self
            .rewriter
            .change
            .append
            .iter()
            .filter(|a| a.field == section)
            .map(|a| a.value.clone())
            .collect();
        if values.is_empty() {
            return;
        }

        let rest = lines.iter().enumerate().skip(index + 1);
        let target = rest
            .clone()
            .find(|(_, l)| l.trim_start().starts_with('%'))
            .or_else(|| rest.clone().find(|(_, l)| l.trim().is_empty()))
            .map_or(lines.len(), |(i, _)| i);
        self.queued.entry(target).or_default().extend(values);
    }

    fn close_sources(&mut self) {
        self.in_sources = false;
        let names: Vec<String> = self
            .rewriter
            .file_ops(FileKind::Source, FileMode::Add)
            .map(str::to_string)
            .collect();
        for name in names {
            let field = format!("Source{}", self.next_source);
            self.next_source += 1;
            let rendered = self.render(&field, &name);
            self.out.push(rendered);
        }

        let adds_patches = self
            .rewriter
            .file_ops(FileKind::Patch, FileMode::Add)
            .next()
            .is_some();
        if !self.layout.has_patch && adds_patches {
            self.out.push(String::new());
            self.in_patches = true;
        }
    }

    fn close_patches(&mut self) {
        self.in_patches = false;
        let names: Vec<String> = self
            .rewriter
            .file_ops(FileKind::Patch, FileMode::Add)
            .map(str::to_string)
            .collect();
        for name in names {
            let field = format!("Patch{}", self.next_patch);
            self.next_patch += 1;
            let rendered = self.render(&field, &name);
            self.out.push(rendered);
        }

        if !self.layout.has_changelog && !self.rewriter.change.changelog.is_empty() {
            self.out.push(String::new());
            self.out.push(CHANGELOG.to_string());
            self.write_changelog();
        }
    }

    fn write_changelog(&mut self) {
        self.changelog_written = true;
        let date = self.rewriter.today.format("%a %b %d %Y").to_string();
        let version = self.version.clone().unwrap_or_default();
        for entry in &self.rewriter.change.changelog {
            self.out.push(format!(
                "* {date} {} <{}> - {version}",
                entry.author_name, entry.author_email
            ));
            for message in &entry.message {
                self.out.push(format!("- {message}"));
            }
            self.out.push(String::new());
        }
    }

    fn finish(&mut self, end: usize) {
        if self.in_sources {
            self.close_sources();
        }
        if self.in_patches {
            self.close_patches();
        }
        if let Some(values) = self.queued.remove(&end) {
            self.out.extend(values);
        }
        if !self.changelog_written && !self.rewriter.change.changelog.is_empty() {
            self.out.push(String::new());
            self.out.push(CHANGELOG.to_string());
            self.write_changelog();
        }
    }

    fn render(&self, field: &str, value: &str) -> String {
        let pad = (self.layout.longest + 8).saturating_sub(field.len()).max(1);
        format!("{field}:{}{value}", " ".repeat(pad))
    }
}

/// Rewrite the single spec file under `tree/SPECS` in place.
pub fn apply_spec_change(
    tree: &std::path::Path,
    change: &SpecChange,
    version: Option<String>,
    today: NaiveDate,
) -> Result<(), DirectiveError> {
    let specs = tree.join(SPECS_DIR);
    let entries = fs::read_dir(&specs)
        .map_err(|_| DirectiveError::new(ErrorCode::CouldNotReadSpecsDir, SPECS_DIR))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|_| DirectiveError::new(ErrorCode::CouldNotReadSpecsDir, SPECS_DIR))?;
        if entry.path().is_file() {
            files.push(entry.path());
        }
    }
    let [path] = files.as_slice() else {
        return Err(DirectiveError::new(ErrorCode::OnlyOneSpecFileIsSupported, ""));
    };
    let rel = format!(
        "{SPECS_DIR}/{}",
        path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    );

    let input = fs::read_to_string(path)
        .map_err(|_| DirectiveError::new(ErrorCode::CouldNotReadSpecFile, &rel))?;
    let output = SpecRewriter::new(change, version, today).rewrite(&input)?;
    // Writing over the existing file keeps its mode.
    fs::write(path, output)
        .map_err(|_| DirectiveError::new(ErrorCode::CouldNotWriteSpecFile, &rel))?;

    info!(spec = %rel, "rewrote spec file");
    Ok(())
}
