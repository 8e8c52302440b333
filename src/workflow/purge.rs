// src/workflow/purge.rs

//! Purge: the only irreversible operation
//!
//! Lists the per-run trash directories with their size and age, filters
//! them by the provided predicates (logical AND), and removes the
//! matches recursively. Safety rails: without any filter nothing is
//! deleted (the listing is still reported), and `--all` requires
//! `--force` outside dry-run.

use crate::error::{Error, Result};
use crate::filesystem::SafePath;
use crate::lock::RootLock;
use crate::metadir::{MetaDir, RunId};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Filters and flags for one purge invocation
#[derive(Debug, Clone, Default)]
pub struct PurgeOptions {
    /// Only this run
    pub run_id: Option<String>,
    /// Only runs older than this
    pub older_than: Option<Duration>,
    /// Every run
    pub all: bool,
    pub dry_run: bool,
    /// Required for `all` outside dry-run
    pub force: bool,
}

impl PurgeOptions {
    fn has_filter(&self) -> bool {
        self.run_id.is_some() || self.older_than.is_some() || self.all
    }
}

/// One run directory under `.btidy/trash/`
#[derive(Debug, Clone)]
pub struct TrashRun {
    pub run_id: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub total_size: u64,
    pub created_at: DateTime<Utc>,
}

impl TrashRun {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// Per-run purge outcome
#[derive(Debug, Clone)]
pub struct PurgeAction {
    pub run_id: String,
    pub size: u64,
    /// False in dry-run ("WOULD PURGE")
    pub purged: bool,
    pub error: Option<Error>,
}

/// Aggregate result of a purge invocation
#[derive(Debug)]
pub struct PurgeReport {
    /// Every run found, filtered or not
    pub runs: Vec<TrashRun>,
    pub actions: Vec<PurgeAction>,
    pub purged_count: usize,
    pub purged_size: u64,
    pub error_count: usize,
    pub dry_run: bool,
}

/// Parse an age filter of the form `<n>(s|m|h|d)`, e.g. `1000h`
pub fn parse_age(input: &str) -> Result<Duration> {
    let input = input.trim();
    let invalid = || {
        Error::ConfigError(format!(
            "invalid duration {:?}, expected <n>(s|m|h|d)",
            input
        ))
    };

    if input.len() < 2 {
        return Err(invalid());
    }
    let (number, unit) = input.split_at(input.len() - 1);
    let value: i64 = number.parse().map_err(|_| invalid())?;
    if value < 0 {
        return Err(invalid());
    }

    match unit {
        "s" => Ok(Duration::seconds(value)),
        "m" => Ok(Duration::minutes(value)),
        "h" => Ok(Duration::hours(value)),
        "d" => Ok(Duration::days(value)),
        _ => Err(invalid()),
    }
}

/// List and optionally remove trash runs under `target`
pub fn purge(target: &Path, options: &PurgeOptions) -> Result<PurgeReport> {
    if options.all && !options.dry_run && !options.force {
        return Err(Error::ConfigError(
            "purging all runs requires --force".to_string(),
        ));
    }

    let safe = SafePath::new(target)?;
    let meta = MetaDir::init(safe.root())?;
    let _lock = RootLock::acquire(&meta.lock_path())?;

    let runs = list_runs(&meta)?;
    let now = Utc::now();

    let selected: Vec<&TrashRun> = if options.has_filter() {
        runs.iter()
            .filter(|run| {
                options
                    .run_id
                    .as_deref()
                    .is_none_or(|wanted| run.run_id == wanted)
            })
            .filter(|run| {
                options
                    .older_than
                    .is_none_or(|threshold| run.age(now) > threshold)
            })
            .collect()
    } else {
        // No filter selects nothing; the listing alone is the result.
        Vec::new()
    };

    let mut actions = Vec::new();
    let mut purged_count = 0;
    let mut purged_size = 0;
    let mut error_count = 0;

    for run in selected {
        if options.dry_run {
            info!("WOULD PURGE {} ({} bytes)", run.run_id, run.total_size);
            actions.push(PurgeAction {
                run_id: run.run_id.clone(),
                size: run.total_size,
                purged: false,
                error: None,
            });
            continue;
        }

        match safe.safe_remove_dir_all(&run.path) {
            Ok(()) => {
                info!("purged {} ({} bytes)", run.run_id, run.total_size);
                purged_count += 1;
                purged_size += run.total_size;
                actions.push(PurgeAction {
                    run_id: run.run_id.clone(),
                    size: run.total_size,
                    purged: true,
                    error: None,
                });
            }
            Err(e) => {
                error_count += 1;
                actions.push(PurgeAction {
                    run_id: run.run_id.clone(),
                    size: run.total_size,
                    purged: false,
                    error: Some(e),
                });
            }
        }
    }

    Ok(PurgeReport {
        runs,
        actions,
        purged_count,
        purged_size,
        error_count,
        dry_run: options.dry_run,
    })
}

/// Scan `.btidy/trash/` into run records, sorted by run id
fn list_runs(meta: &MetaDir) -> Result<Vec<TrashRun>> {
    let trash_root = meta.trash_root();
    let mut runs = Vec::new();

    if !trash_root.exists() {
        return Ok(runs);
    }

    for entry in fs::read_dir(&trash_root).map_err(|e| Error::io(&trash_root, e))? {
        let entry = entry.map_err(|e| Error::io(&trash_root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let run_id = entry.file_name().to_string_lossy().into_owned();

        let mut file_count = 0;
        let mut total_size = 0;
        for file in WalkDir::new(&path).follow_links(false) {
            let file = file.map_err(|e| Error::IoError(e.to_string()))?;
            if file.file_type().is_file() {
                file_count += 1;
                total_size += file.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        // The id embeds the creation second; directory mtime is the
        // fallback for foreign names.
        let created_at = RunId::parse(&run_id)
            .ok()
            .and_then(|id| id.timestamp())
            .or_else(|| {
                entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from)
            })
            .unwrap_or_else(Utc::now);

        runs.push(TrashRun {
            run_id,
            path,
            file_count,
            total_size,
            created_at,
        });
    }

    runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
    Ok(runs)
}
