// src/workflow/mod.rs

//! Workflow runner
//!
//! Every mutating command goes through the same pipeline:
//!
//! ```text
//! resolve root -> lock -> walk -> snapshot -> execute -> journal -> classify
//! ```
//!
//! The runner owns the shared services (validator, trasher, run
//! journal) and lends them to a stateless executor; executors never call
//! back into the runner. The advisory lock is scoped to the run and
//! released on every exit path, including panics, via RAII.
//!
//! Journaling is strictly interleaved per mutation: the executor writes
//! the intent (fsynced) immediately before each filesystem op and the
//! confirmation (fsynced) immediately after it succeeds, so a crash at
//! any point leaves every completed mutation on record for undo. A
//! journal that ends up with no entries is discarded. Any containment
//! escape among the recorded operations is reclassified into a fatal
//! [`Error::UnsafeOperation`] so the bug is loud, even though the
//! validator already prevented the mutation itself.

pub mod journal;
pub mod purge;
pub mod undo;

use crate::error::{Error, Result};
use crate::executors::{self, ExecContext, OpCounts, Operation, OpStatus, Request};
use crate::filesystem::{SafePath, collect_files};
use crate::hash::HashConfig;
use crate::lock::RootLock;
use crate::manifest::Manifest;
use crate::metadir::{MetaDir, RunId};
use crate::progress::{ProgressTracker, SilentProgress};
use crate::trash::Trasher;
use journal::RunJournal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Options shared by every mutating workflow
#[derive(Clone)]
pub struct WorkflowOptions {
    /// Plan and report without touching user files
    pub dry_run: bool,
    /// Write the pre-operation manifest snapshot
    pub snapshot: bool,
    /// Worker pool sizing for hashing stages
    pub hash_config: HashConfig,
    /// Progress sink; the engine reports `(stage, processed, total)`
    pub progress: Arc<dyn ProgressTracker>,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            snapshot: true,
            hash_config: HashConfig::default(),
            progress: Arc::new(SilentProgress::new()),
        }
    }
}

/// What a completed (or dry-run) workflow did
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub run_id: RunId,
    pub operations: Vec<Operation>,
    pub counts: OpCounts,
    /// Files the walker collected
    pub files_considered: usize,
    pub walk_duration: Duration,
    /// Journal written for this run, when any mutation succeeded
    pub journal_path: Option<PathBuf>,
    /// Snapshot written for this run
    pub snapshot_path: Option<PathBuf>,
    pub dry_run: bool,
}

/// Run one mutating command against `target`
pub fn execute(target: &Path, request: Request, options: &WorkflowOptions) -> Result<WorkflowOutcome> {
    let safe = SafePath::new(target)?;
    let meta = MetaDir::init(safe.root())?;
    let _lock = RootLock::acquire(&meta.lock_path())?;

    let run_id = RunId::mint(request.command());
    info!(
        "run {} starting on {} (dry_run={})",
        run_id,
        safe.root().display(),
        options.dry_run
    );

    let walk_started = Instant::now();
    let files = collect_files(safe.root())?;
    let walk_duration = walk_started.elapsed();
    info!("collected {} files in {:?}", files.len(), walk_duration);

    if files.is_empty() {
        return Ok(WorkflowOutcome {
            run_id,
            operations: Vec::new(),
            counts: OpCounts::default(),
            files_considered: 0,
            walk_duration,
            journal_path: None,
            snapshot_path: None,
            dry_run: options.dry_run,
        });
    }

    let snapshot_path = if !options.dry_run && options.snapshot {
        let manifest = Manifest::generate(&safe, &files, options.hash_config)?;
        let path = meta.manifest_path(&run_id);
        manifest.save(&path)?;
        Some(path)
    } else {
        None
    };

    let trasher = if options.dry_run {
        None
    } else {
        Some(Trasher::create(&safe, &meta, &run_id)?)
    };
    let run_journal = if options.dry_run {
        None
    } else {
        Some(RunJournal::create(&safe, &meta.journal_path(&run_id))?)
    };

    let ctx = ExecContext {
        safe: &safe,
        files: &files,
        trasher: trasher.as_ref(),
        journal: run_journal.as_ref(),
        progress: options.progress.as_ref(),
        hash_config: options.hash_config,
        dry_run: options.dry_run,
    };
    let operations = executors::execute(request, &ctx)?;
    let counts = OpCounts::tally(&operations);

    let journal_path = match run_journal {
        Some(run_journal) => run_journal.finish()?,
        None => None,
    };

    let escapes: Vec<String> = operations
        .iter()
        .filter_map(|op| match &op.status {
            OpStatus::Failed(e) if e.is_escape() => Some(format!("{}: {}", op.src.display(), e)),
            _ => None,
        })
        .collect();
    if !escapes.is_empty() {
        return Err(Error::UnsafeOperation(escapes.join("; ")));
    }

    info!(
        "run {} finished: {} ok, {} skipped, {} errors",
        run_id, counts.ok, counts.skipped, counts.errors
    );

    Ok(WorkflowOutcome {
        run_id,
        operations,
        counts,
        files_considered: files.len(),
        walk_duration,
        journal_path,
        snapshot_path,
        dry_run: options.dry_run,
    })
}

