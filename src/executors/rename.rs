// src/executors/rename.rs

//! Canonical renaming
//!
//! Rewrites each file name to `<mtime date>_<slug>.<ext>`: the
//! modification date as `YYYY-MM-DD`, the stem lowercased with runs of
//! non-alphanumerics collapsed to single underscores, and the extension
//! lowercased. `My Document.pdf` modified on 2024-07-02 becomes
//! `2024-07-02_my_document.pdf`.
//!
//! Files already in canonical form are skipped, which makes a second run
//! a no-op.

use super::{ExecContext, Operation, split_name};
use crate::error::Result;
use crate::workflow::journal::EntryKind;
use std::collections::HashSet;
use std::path::PathBuf;

/// Slugify a file stem: lowercase, non-alphanumeric runs become one `_`
fn slugify(stem: &str) -> String {
    let mut slug = String::with_capacity(stem.len());
    let mut pending_sep = false;

    for c in stem.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_sep = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("file");
    }
    slug
}

/// The canonical name for a file with this name and mtime
fn canonical_name(name: &str, date: &str) -> String {
    let (stem, ext) = split_name(name);
    match ext {
        Some(ext) => format!("{}_{}.{}", date, slugify(&stem), ext.to_lowercase()),
        None => format!("{}_{}", date, slugify(&stem)),
    }
}

/// True when `name` is already of canonical shape
///
/// The date prefix is accepted regardless of its value so that a second
/// pass never stacks another prefix onto an already-canonical name.
fn is_canonical(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < 11 {
        return false;
    }
    let date_ok = bytes[..10]
        .iter()
        .enumerate()
        .all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
        && bytes[10] == b'_';
    if !date_ok {
        return false;
    }

    let rest = &name[11..];
    if rest.is_empty() {
        return false;
    }
    let (stem, ext) = split_name(rest);
    stem == slugify(&stem)
        && ext
            .as_deref()
            .is_none_or(|e| e == e.to_lowercase())
}

pub fn execute(ctx: &ExecContext<'_>) -> Result<Vec<Operation>> {
    let total = ctx.files.len() as u64;
    let mut operations = Vec::with_capacity(ctx.files.len());
    // Names claimed per directory during this run, so two sources never
    // race for the same canonical target.
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for (i, file) in ctx.files.iter().enumerate() {
        ctx.progress.report("rename", i as u64 + 1, total);

        if is_canonical(&file.name) {
            operations.push(Operation::skipped(
                EntryKind::Rename,
                &file.path,
                "already canonical",
            ));
            continue;
        }

        let date = file.mtime.format("%Y-%m-%d").to_string();
        let target = file.dir.join(canonical_name(&file.name, &date));

        if target == file.path {
            operations.push(Operation::skipped(
                EntryKind::Rename,
                &file.path,
                "already canonical",
            ));
            continue;
        }

        if claimed.contains(&target) || target.symlink_metadata().is_ok() {
            operations.push(Operation::skipped(
                EntryKind::Rename,
                &file.path,
                "target exists",
            ));
            continue;
        }

        let intent = ctx.log_intent(EntryKind::Rename, &file.path, Some(&target), None)?;
        if !ctx.dry_run {
            if let Err(e) = ctx.safe.safe_rename(&file.path, &target) {
                // The unconfirmed intent marks the journal as partial.
                operations.push(Operation::failed(EntryKind::Rename, &file.path, e));
                continue;
            }
        }
        ctx.log_confirmation(&intent)?;

        claimed.insert(target.clone());
        operations.push(Operation::ok(EntryKind::Rename, &file.path).with_dst(target));
    }

    Ok(operations)
}
