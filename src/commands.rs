// src/commands.rs
//! Command handlers for the btidy CLI
//!
//! Thin bridge between the clap surface and the engine: builds workflow
//! options, runs the engine, and renders human-readable summaries.
//! Anything fatal propagates as an error and exits non-zero with a
//! single error line.

use crate::cli::MutateArgs;
use anyhow::Result;
use btidy::workflow::journal;
use btidy::workflow::purge::{self, PurgeOptions};
use btidy::workflow::undo::{self, UndoOptions};
use btidy::{
    CliProgress, Error, HashConfig, MetaDir, OpStatus, ProgressTracker, Request, SafePath,
    SilentProgress, WorkflowOptions, workflow,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Past-tense verb for a command's summary line
fn verb(request: Request) -> &'static str {
    match request {
        Request::Rename => "Renamed",
        Request::Flatten => "Flattened",
        Request::Organize => "Organized",
        Request::Duplicate => "Trashed",
        Request::Unzip => "Extracted",
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Run one mutating command and print its summary
pub fn cmd_mutate(request: Request, args: &MutateArgs) -> Result<()> {
    let progress: Arc<dyn ProgressTracker> = if args.quiet {
        Arc::new(SilentProgress::new())
    } else {
        Arc::new(CliProgress::new())
    };

    let options = WorkflowOptions {
        dry_run: args.dry_run,
        snapshot: !args.no_snapshot,
        hash_config: HashConfig::with_workers(args.workers),
        progress,
    };

    let outcome = workflow::execute(Path::new(&args.dir), request, &options)?;
    options.progress.finish("done");

    let prefix = if outcome.dry_run { "[dry-run] " } else { "" };
    println!("{}Run ID:  {}", prefix, outcome.run_id);
    println!("{}Files:   {}", prefix, outcome.files_considered);
    println!("{}{}: {}", prefix, verb(request), outcome.counts.ok);
    println!("{}Skipped: {}", prefix, outcome.counts.skipped);
    println!("{}Errors:  {}", prefix, outcome.counts.errors);

    for op in &outcome.operations {
        if let OpStatus::Failed(e) = &op.status {
            println!("  [FAILED] {}: {}", op.src.display(), e);
        }
    }

    Ok(())
}

/// Reverse the newest run (or a requested one)
pub fn cmd_undo(dir: &str, run_id: Option<String>, dry_run: bool) -> Result<()> {
    let options = UndoOptions { run_id, dry_run };
    let report = undo::undo(Path::new(dir), &options)?;

    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    println!("{}Run ID:   {}", prefix, report.run_id);
    println!("{}Restored: {}", prefix, report.restored);
    println!("{}Reversed: {}", prefix, report.reversed);
    println!("{}Skipped:  {}", prefix, report.skipped);
    println!("{}Errors:   {}", prefix, report.errors);
    if let Some(path) = &report.rolled_back_path {
        println!("{}Journal:  {}", prefix, path.display());
    }

    Ok(())
}

/// List and optionally remove trash runs
pub fn cmd_purge(
    dir: &str,
    run_id: Option<String>,
    older_than: Option<String>,
    all: bool,
    force: bool,
    dry_run: bool,
) -> Result<()> {
    let older_than = older_than.as_deref().map(purge::parse_age).transpose()?;
    let options = PurgeOptions {
        run_id,
        older_than,
        all,
        dry_run,
        force,
    };
    let report = purge::purge(Path::new(dir), &options)?;

    if report.runs.is_empty() {
        println!("No trash runs under {}", dir);
        return Ok(());
    }

    println!("Runs:");
    for run in &report.runs {
        println!(
            "  {}  {} files, {}",
            run.run_id,
            run.file_count,
            format_size(run.total_size)
        );
    }

    for action in &report.actions {
        match (&action.error, action.purged) {
            (Some(e), _) => println!("  [FAILED] {}: {}", action.run_id, e),
            (None, true) => println!("  Purged {}", action.run_id),
            (None, false) => println!("  WOULD PURGE {}", action.run_id),
        }
    }

    println!(
        "Purged: {} run(s), {}; Errors: {}",
        report.purged_count,
        format_size(report.purged_size),
        report.error_count
    );

    Ok(())
}

/// List trash runs and journal state for a root
pub fn cmd_runs(dir: &str) -> Result<()> {
    // A filterless dry-run purge is exactly the listing.
    let report = purge::purge(
        Path::new(dir),
        &PurgeOptions {
            dry_run: true,
            ..Default::default()
        },
    )?;

    if report.runs.is_empty() {
        println!("No trash runs under {}", dir);
    } else {
        println!("Trash runs:");
        for run in &report.runs {
            println!(
                "  {}  {} files, {}",
                run.run_id,
                run.file_count,
                format_size(run.total_size)
            );
        }
    }

    let safe = SafePath::new(Path::new(dir))?;
    let meta = MetaDir::init(safe.root())?;
    let active = journal::list_active(&meta.journal_dir())?;
    println!("Active journals: {}", active.len());
    for path in &active {
        if let Some(name) = path.file_name() {
            println!("  {}", name.to_string_lossy());
        }
    }

    Ok(())
}

/// Validate journal pairing for one run or every active journal
pub fn cmd_validate(dir: &str, run_id: Option<String>) -> Result<()> {
    let safe = SafePath::new(Path::new(dir))?;
    let meta = MetaDir::init(safe.root())?;

    let journals = match run_id {
        Some(id) => vec![meta.journal_dir().join(format!("{}.jsonl", id))],
        None => journal::list_active(&meta.journal_dir())?,
    };

    if journals.is_empty() {
        println!("No active journals under {}", dir);
        return Ok(());
    }

    let mut partial = 0;
    for path in &journals {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match journal::validate(path) {
            Ok(()) => println!("  [OK] {}", name),
            Err(Error::PartialWrite(msg)) => {
                partial += 1;
                println!("  [PARTIAL] {}: {}", name, msg);
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("validated {} journal(s), {} partial", journals.len(), partial);
    if partial > 0 {
        anyhow::bail!("{} journal(s) have unconfirmed intents", partial);
    }
    Ok(())
}
