// src/executors/flatten.rs

//! Tree flattening
//!
//! Moves every file in a subdirectory up to the root, in path order. A
//! name collision at the root resolves by content: identical bytes mean
//! the incoming file is a duplicate and goes to trash (with its hash
//! journaled for undo verification), different bytes get the first free
//! `<stem>_<n>.<ext>` suffix. Directories left empty by the moves are
//! pruned bottom-up; undo recreates any parents it needs when restoring.

use super::{ExecContext, Operation, suffixed_name};
use crate::error::Result;
use crate::hash;
use crate::workflow::journal::EntryKind;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

pub fn execute(ctx: &ExecContext<'_>) -> Result<Vec<Operation>> {
    let root = ctx.safe.root();
    let mut operations = Vec::new();

    // Current occupant of each root-level name, updated as files land.
    let mut occupants: HashMap<String, PathBuf> = ctx
        .files
        .iter()
        .filter(|f| f.dir == root)
        .map(|f| (f.name.clone(), f.path.clone()))
        .collect();

    let movers: Vec<_> = ctx.files.iter().filter(|f| f.dir != root).collect();
    let total = movers.len() as u64;
    let mut source_dirs: BTreeSet<PathBuf> = BTreeSet::new();

    for (i, file) in movers.iter().enumerate() {
        ctx.progress.report("flatten", i as u64 + 1, total);

        let mut name = file.name.clone();
        if let Some(occupant) = occupants.get(&name) {
            let incoming = match hash::hash_file(&file.path) {
                Ok(h) => h,
                Err(e) => {
                    operations.push(Operation::failed_preparation(&file.path, e));
                    continue;
                }
            };
            let existing = match hash::hash_file(occupant) {
                Ok(h) => h,
                Err(e) => {
                    operations.push(Operation::failed_preparation(&file.path, e));
                    continue;
                }
            };

            if incoming == existing {
                // Same content already lives at the root; soft-delete the
                // incoming copy.
                let op = super::trash_file(ctx, &file.path, &incoming)?;
                if op.is_ok() {
                    source_dirs.insert(file.dir.clone());
                }
                operations.push(op);
                continue;
            }

            let taken: HashSet<String> = occupants.keys().cloned().collect();
            name = suffixed_name(&name, &taken);
        }

        let target = root.join(&name);
        let intent = ctx.log_intent(EntryKind::Rename, &file.path, Some(&target), None)?;
        if !ctx.dry_run {
            if let Err(e) = ctx.safe.safe_rename(&file.path, &target) {
                // The unconfirmed intent marks the journal as partial.
                operations.push(Operation::failed(EntryKind::Rename, &file.path, e));
                continue;
            }
        }
        ctx.log_confirmation(&intent)?;

        // Map the name to wherever the occupant's bytes can be read: in
        // dry-run the file never moved.
        let occupant_path = if ctx.dry_run {
            file.path.clone()
        } else {
            target.clone()
        };
        occupants.insert(name, occupant_path);
        source_dirs.insert(file.dir.clone());
        operations.push(Operation::ok(EntryKind::Rename, &file.path).with_dst(target));
    }

    if !ctx.dry_run {
        prune_empty_dirs(ctx, source_dirs);
    }

    Ok(operations)
}

/// Remove directories the moves emptied, ascending until a non-empty
/// parent or the root stops the climb. Failures are ignored; a dir that
/// will not go away is simply left.
pub(super) fn prune_empty_dirs(ctx: &ExecContext<'_>, dirs: BTreeSet<PathBuf>) {
    let root = ctx.safe.root();
    // Deepest first.
    for dir in dirs.into_iter().rev() {
        let mut current = dir;
        while current != root {
            let empty = std::fs::read_dir(&current)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !empty || ctx.safe.safe_remove_dir(&current).is_err() {
                break;
            }
            let Some(parent) = current.parent() else {
                break;
            };
            current = parent.to_path_buf();
        }
    }
}
