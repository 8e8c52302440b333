// src/workflow/undo.rs

//! Undo: reverse replay of a run journal
//!
//! Reads the newest (or requested) active journal in reverse and unwinds
//! each confirmed mutation: trashed files move back to their original
//! location after their bytes verify against the journaled hash, renames
//! reverse positionally, extractions are left alone (their paired trash
//! entry restores the archive). Per-entry failures are recorded and the
//! replay always completes; only lock acquisition and journal I/O are
//! fatal.
//!
//! A successfully processed journal is renamed to
//! `<runID>.rolled-back.jsonl` so it can never be applied twice.

use super::journal::{self, EntryKind, JournalEntry};
use crate::error::{Error, Result};
use crate::filesystem::SafePath;
use crate::hash;
use crate::lock::RootLock;
use crate::metadir::{MetaDir, RunId};
use crate::trash::Trasher;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Options for one undo invocation
#[derive(Debug, Clone, Default)]
pub struct UndoOptions {
    /// Undo this specific run instead of the newest one
    pub run_id: Option<String>,
    /// Perform every check, including hashing, but move nothing
    pub dry_run: bool,
}

/// What happened to one journal entry during replay
#[derive(Debug, Clone)]
pub enum UndoOutcome {
    /// A trashed file returned to its original location
    Restored(PathBuf),
    /// A rename was reversed
    Reversed(PathBuf),
    /// Trashed bytes no longer match the journaled hash; the entry is
    /// counted as a skip and nothing live is touched. Always carries
    /// [`Error::HashMismatch`].
    HashMismatch(Error),
    Skipped(String),
    Failed(Error),
}

/// One replayed entry with its outcome
#[derive(Debug, Clone)]
pub struct UndoAction {
    pub entry: JournalEntry,
    pub outcome: UndoOutcome,
}

/// Aggregate result of an undo invocation
#[derive(Debug)]
pub struct UndoReport {
    pub run_id: RunId,
    pub journal_path: PathBuf,
    pub actions: Vec<UndoAction>,
    pub restored: usize,
    pub reversed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Where the journal was renamed to (absent in dry-run)
    pub rolled_back_path: Option<PathBuf>,
    pub dry_run: bool,
}

/// Replay the newest (or requested) journal in reverse
pub fn undo(target: &Path, options: &UndoOptions) -> Result<UndoReport> {
    let safe = SafePath::new(target)?;
    let meta = MetaDir::init(safe.root())?;
    let _lock = RootLock::acquire(&meta.lock_path())?;

    let journal_path = select_journal(&meta, options.run_id.as_deref())?;
    let run_id = run_id_of(&journal_path)?;
    info!(
        "undoing run {} from {} (dry_run={})",
        run_id,
        journal_path.display(),
        options.dry_run
    );

    let trasher = Trasher::create(&safe, &meta, &run_id)?;
    let entries = journal::read_entries_reversed(&journal_path)?;

    let mut actions = Vec::new();
    for entry in entries {
        // Confirmations are the single source of truth that a mutation
        // happened; intents are pairing metadata.
        if !entry.ok {
            continue;
        }
        let outcome = replay_entry(&safe, &trasher, &entry, options.dry_run);
        actions.push(UndoAction { entry, outcome });
    }

    let mut report = UndoReport {
        run_id,
        journal_path: journal_path.clone(),
        restored: 0,
        reversed: 0,
        skipped: 0,
        errors: 0,
        actions,
        rolled_back_path: None,
        dry_run: options.dry_run,
    };
    for action in &report.actions {
        match &action.outcome {
            UndoOutcome::Restored(_) => report.restored += 1,
            UndoOutcome::Reversed(_) => report.reversed += 1,
            UndoOutcome::HashMismatch(_) | UndoOutcome::Skipped(_) => report.skipped += 1,
            UndoOutcome::Failed(_) => report.errors += 1,
        }
    }

    if !options.dry_run {
        report.rolled_back_path = Some(journal::mark_rolled_back(&journal_path)?);
    }

    info!(
        "undo of {} finished: {} restored, {} reversed, {} skipped, {} errors",
        report.run_id, report.restored, report.reversed, report.skipped, report.errors
    );
    Ok(report)
}

/// Pick the journal to replay: the one matching `run_id`, or the newest
fn select_journal(meta: &MetaDir, run_id: Option<&str>) -> Result<PathBuf> {
    let active = journal::list_active(&meta.journal_dir())?;

    match run_id {
        Some(id) => {
            let wanted = format!("{}.jsonl", id);
            active
                .into_iter()
                .find(|p| p.file_name().is_some_and(|n| n == wanted.as_str()))
                .ok_or_else(|| Error::NoActiveJournals(format!("run {} not found", id)))
        }
        // Run ids embed the wall-clock second, so name order is age order.
        None => active
            .into_iter()
            .next_back()
            .ok_or_else(|| Error::NoActiveJournals(meta.journal_dir().display().to_string())),
    }
}

fn run_id_of(journal_path: &Path) -> Result<RunId> {
    let stem = journal_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".jsonl"))
        .ok_or_else(|| {
            Error::InvalidPath(format!("not a journal: {}", journal_path.display()))
        })?;
    RunId::parse(stem)
}

fn replay_entry(
    safe: &SafePath,
    trasher: &Trasher,
    entry: &JournalEntry,
    dry_run: bool,
) -> UndoOutcome {
    match entry.kind {
        EntryKind::Trash => replay_trash(safe, trasher, entry, dry_run),
        EntryKind::Rename => replay_rename(safe, entry, dry_run),
        EntryKind::Extract => {
            UndoOutcome::Skipped("extraction reversed through its archive's trash entry".into())
        }
        EntryKind::Mkdir | EntryKind::Replace => UndoOutcome::Skipped("no-op".into()),
    }
}

fn replay_trash(
    safe: &SafePath,
    trasher: &Trasher,
    entry: &JournalEntry,
    dry_run: bool,
) -> UndoOutcome {
    let Some(dst) = &entry.dst else {
        return UndoOutcome::Failed(Error::InvalidPath(format!(
            "trash entry for {} has no destination",
            entry.src
        )));
    };
    let trashed = safe.root().join(dst);
    if fs::symlink_metadata(&trashed).is_err() {
        return UndoOutcome::Failed(Error::NotInTrash(trashed.display().to_string()));
    }

    if let Some(expected) = &entry.hash {
        match hash::hash_file(&trashed) {
            Ok(actual) if &actual != expected => {
                let err = Error::HashMismatch {
                    path: entry.src.clone(),
                    expected: expected.clone(),
                    actual,
                };
                warn!("skipping restore: {}", err);
                return UndoOutcome::HashMismatch(err);
            }
            Ok(_) => {}
            Err(e) => return UndoOutcome::Failed(e),
        }
    }

    if dry_run {
        return UndoOutcome::Restored(safe.root().join(&entry.src));
    }

    match trasher.restore(&trashed) {
        Ok(original) => UndoOutcome::Restored(original),
        Err(e) => UndoOutcome::Failed(e),
    }
}

fn replay_rename(safe: &SafePath, entry: &JournalEntry, dry_run: bool) -> UndoOutcome {
    let Some(dst) = &entry.dst else {
        return UndoOutcome::Failed(Error::InvalidPath(format!(
            "rename entry for {} has no destination",
            entry.src
        )));
    };
    let renamed = safe.root().join(dst);
    let original = safe.root().join(&entry.src);

    if fs::symlink_metadata(&renamed).is_err() {
        return UndoOutcome::Skipped(format!("renamed file missing: {}", dst));
    }
    if fs::symlink_metadata(&original).is_ok() {
        return UndoOutcome::Skipped(format!("original path occupied: {}", entry.src));
    }

    if dry_run {
        return UndoOutcome::Reversed(original);
    }

    match safe.safe_rename(&renamed, &original) {
        Ok(()) => UndoOutcome::Reversed(original),
        Err(e) => UndoOutcome::Failed(e),
    }
}
