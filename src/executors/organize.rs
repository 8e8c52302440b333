// src/executors/organize.rs

//! Grouping by extension
//!
//! Moves every file into `<root>/<ext>/`, where the bucket is the
//! lowercase extension (`no_ext` for files without one). Files already
//! sitting in their bucket are skipped, so a second run is a no-op. Name
//! collisions inside a bucket get the shared numeric-suffix rule.

use super::{ExecContext, Operation, suffixed_name};
use crate::error::Result;
use crate::workflow::journal::EntryKind;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

/// Bucket directory name for files without an extension
pub const NO_EXT_BUCKET: &str = "no_ext";

/// The bucket a file name sorts into
fn bucket_for(name: &str) -> String {
    match super::split_name(name).1 {
        Some(ext) if !ext.is_empty() => ext.to_lowercase(),
        _ => NO_EXT_BUCKET.to_string(),
    }
}

pub fn execute(ctx: &ExecContext<'_>) -> Result<Vec<Operation>> {
    let root = ctx.safe.root();
    let total = ctx.files.len() as u64;
    let mut operations = Vec::with_capacity(ctx.files.len());

    // Names present per bucket, seeded from files already there.
    let mut bucket_names: HashMap<String, HashSet<String>> = HashMap::new();
    for file in ctx.files {
        if let Ok(rel) = file.dir.strip_prefix(root)
            && let Some(first) = rel.iter().next()
            && rel.iter().count() == 1
        {
            bucket_names
                .entry(first.to_string_lossy().into_owned())
                .or_default()
                .insert(file.name.clone());
        }
    }

    let mut source_dirs: BTreeSet<PathBuf> = BTreeSet::new();

    for (i, file) in ctx.files.iter().enumerate() {
        ctx.progress.report("organize", i as u64 + 1, total);

        let bucket = bucket_for(&file.name);
        let bucket_dir = root.join(&bucket);

        if file.dir == bucket_dir {
            operations.push(Operation::skipped(
                EntryKind::Rename,
                &file.path,
                "already organized",
            ));
            continue;
        }

        let names = bucket_names.entry(bucket).or_default();
        let name = if names.contains(&file.name) {
            suffixed_name(&file.name, names)
        } else {
            file.name.clone()
        };
        let target = bucket_dir.join(&name);

        let intent = ctx.log_intent(EntryKind::Rename, &file.path, Some(&target), None)?;
        if !ctx.dry_run {
            if let Err(e) = ctx.safe.safe_rename(&file.path, &target) {
                // The unconfirmed intent marks the journal as partial.
                operations.push(Operation::failed(EntryKind::Rename, &file.path, e));
                continue;
            }
        }
        ctx.log_confirmation(&intent)?;

        names.insert(name);
        if file.dir != root {
            source_dirs.insert(file.dir.clone());
        }
        operations.push(Operation::ok(EntryKind::Rename, &file.path).with_dst(target));
    }

    if !ctx.dry_run {
        super::flatten::prune_empty_dirs(ctx, source_dirs);
    }

    Ok(operations)
}
