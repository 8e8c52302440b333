// src/executors/mod.rs

//! Command executors and their shared operation contract
//!
//! Each executor is a stateless function over an [`ExecContext`] the
//! workflow runner owns: validator, file list, trasher, run journal,
//! progress sink. Executors never call back into the runner; they
//! return a list of [`Operation`]s describing what happened (or, in
//! dry-run, what would happen).
//!
//! Journaling is interleaved per mutation, never batched: the executor
//! logs the intent (fsynced) immediately before each filesystem op and
//! the confirmation (fsynced) immediately after it succeeds, through the
//! context helpers. A crash mid-run therefore loses at most the
//! in-flight mutation; everything completed before it stays replayable
//! by undo. Skips are never journaled; a mutation that fails after its
//! intent leaves that intent unconfirmed for `validate` to flag.
//!
//! Every operation records the before-path, the after-path when there is
//! one, and a content hash whenever correctness of a later undo depends
//! on it (trashed files). Status is one of `ok`, `skipped(reason)`, or
//! `failed(error)`.

pub mod duplicate;
pub mod flatten;
pub mod organize;
pub mod rename;
pub mod unzip;

use crate::error::{Error, Result};
use crate::filesystem::{FileRecord, SafePath};
use crate::hash::HashConfig;
use crate::metadir::CommandKind;
use crate::progress::ProgressTracker;
use crate::trash::Trasher;
use crate::workflow::journal::{EntryKind, JournalEntry, RunJournal};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What a workflow was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Rename,
    Flatten,
    Organize,
    Duplicate,
    Unzip,
}

impl Request {
    /// The command owning runs of this request
    pub fn command(&self) -> CommandKind {
        match self {
            Self::Rename => CommandKind::Rename,
            Self::Flatten => CommandKind::Flatten,
            Self::Organize => CommandKind::Organize,
            Self::Duplicate => CommandKind::Duplicate,
            Self::Unzip => CommandKind::Unzip,
        }
    }
}

/// Outcome tag of one operation
#[derive(Debug, Clone, PartialEq)]
pub enum OpStatus {
    Ok,
    Skipped(String),
    Failed(Error),
}

/// One attempted mutation
#[derive(Debug, Clone)]
pub struct Operation {
    /// Journal entry kind this operation maps onto; absent when the
    /// failure happened in a preparatory stage (hashing) before any
    /// mutation kind applied
    pub kind: Option<EntryKind>,
    /// Absolute before-path
    pub src: PathBuf,
    /// Absolute after-path, when the operation has one
    pub dst: Option<PathBuf>,
    /// Content hash, recorded when undo needs to verify it
    pub hash: Option<String>,
    pub status: OpStatus,
}

impl Operation {
    pub fn ok(kind: EntryKind, src: impl Into<PathBuf>) -> Self {
        Self {
            kind: Some(kind),
            src: src.into(),
            dst: None,
            hash: None,
            status: OpStatus::Ok,
        }
    }

    pub fn skipped(kind: EntryKind, src: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            src: src.into(),
            dst: None,
            hash: None,
            status: OpStatus::Skipped(reason.into()),
        }
    }

    pub fn failed(kind: EntryKind, src: impl Into<PathBuf>, err: Error) -> Self {
        Self {
            kind: Some(kind),
            src: src.into(),
            dst: None,
            hash: None,
            status: OpStatus::Failed(err),
        }
    }

    /// Failure in a preparatory stage, before any mutation was attempted
    ///
    /// Hash-stage errors land here: no trash or rename ever started, so
    /// the operation carries no journal kind.
    pub fn failed_preparation(src: impl Into<PathBuf>, err: Error) -> Self {
        Self {
            kind: None,
            src: src.into(),
            dst: None,
            hash: None,
            status: OpStatus::Failed(err),
        }
    }

    pub fn with_dst(mut self, dst: impl Into<PathBuf>) -> Self {
        self.dst = Some(dst.into());
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == OpStatus::Ok
    }
}

/// Aggregate counters over an operation list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub ok: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl OpCounts {
    pub fn tally(operations: &[Operation]) -> Self {
        let mut counts = Self::default();
        for op in operations {
            match op.status {
                OpStatus::Ok => counts.ok += 1,
                OpStatus::Skipped(_) => counts.skipped += 1,
                OpStatus::Failed(_) => counts.errors += 1,
            }
        }
        counts
    }
}

/// Shared services the runner lends to an executor
///
/// `trasher` and `journal` are absent in dry-run; executors must consult
/// `dry_run` before performing any mutation.
pub struct ExecContext<'a> {
    pub safe: &'a SafePath,
    pub files: &'a [FileRecord],
    pub trasher: Option<&'a Trasher>,
    pub journal: Option<&'a RunJournal>,
    pub progress: &'a dyn ProgressTracker,
    pub hash_config: HashConfig,
    pub dry_run: bool,
}

impl ExecContext<'_> {
    /// Journal the intent line for a mutation this executor is about to
    /// perform; returns `None` in dry-run.
    pub fn log_intent(
        &self,
        kind: EntryKind,
        src: &Path,
        dst: Option<&Path>,
        hash: Option<&str>,
    ) -> Result<Option<JournalEntry>> {
        match self.journal {
            Some(journal) => journal.log_intent(kind, src, dst, hash).map(Some),
            None => Ok(None),
        }
    }

    /// Journal the confirmation for a mutation that just succeeded
    pub fn log_confirmation(&self, intent: &Option<JournalEntry>) -> Result<()> {
        if let (Some(journal), Some(intent)) = (self.journal, intent) {
            journal.log_confirmation(intent)?;
        }
        Ok(())
    }
}

/// Soft-delete `path` with the journal interleave around the move
///
/// Shared by every executor that trashes: intent (with the content hash
/// and the pending trash destination) lands before the move, the
/// confirmation after. Per-file failures come back as failed operations;
/// only journal I/O is fatal.
pub(crate) fn trash_file(ctx: &ExecContext<'_>, path: &Path, hash: &str) -> Result<Operation> {
    let Some(trasher) = ctx.trasher else {
        // Dry-run: report what would be trashed.
        return Ok(Operation::ok(EntryKind::Trash, path).with_hash(hash));
    };

    let dest = match trasher.dest_for(path) {
        Ok(dest) => dest,
        Err(e) => return Ok(Operation::failed(EntryKind::Trash, path, e)),
    };

    let intent = ctx.log_intent(EntryKind::Trash, path, Some(&dest), Some(hash))?;
    match trasher.trash(path) {
        Ok(dest) => {
            ctx.log_confirmation(&intent)?;
            Ok(Operation::ok(EntryKind::Trash, path)
                .with_dst(dest)
                .with_hash(hash))
        }
        // The unconfirmed intent marks the journal as partial.
        Err(e) => Ok(Operation::failed(EntryKind::Trash, path, e)),
    }
}

/// Dispatch a request to its executor
pub fn execute(request: Request, ctx: &ExecContext<'_>) -> Result<Vec<Operation>> {
    match request {
        Request::Rename => rename::execute(ctx),
        Request::Flatten => flatten::execute(ctx),
        Request::Organize => organize::execute(ctx),
        Request::Duplicate => duplicate::execute(ctx),
        Request::Unzip => unzip::execute(ctx),
    }
}

/// Split a file name into stem and extension, `foo.tar` -> (`foo`, `tar`)
///
/// Dotfiles keep their leading dot in the stem (`.gitignore` has no
/// extension here), matching `Path::file_stem` semantics.
pub(crate) fn split_name(name: &str) -> (String, Option<String>) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    (stem, ext)
}

/// First free `<stem>_<n>.<ext>` name not present in `taken`, n from 1
pub(crate) fn suffixed_name(name: &str, taken: &HashSet<String>) -> String {
    let (stem, ext) = split_name(name);
    let mut n = 1u32;
    loop {
        let candidate = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
