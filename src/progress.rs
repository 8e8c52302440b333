// src/progress.rs

//! Shared progress tracking trait and implementations
//!
//! Executors report progress as `(stage_label, processed, total)` through
//! the [`ProgressTracker`] trait; they never render anything themselves.
//! Implementations:
//! - `CliProgress`: visual progress bars using indicatif
//! - `LogProgress`: logs progress to tracing at intervals
//! - `SilentProgress`: no-op for scripted/quiet modes
//!
//! Emission is cooperative: executors call the tracker once per processed
//! file and must tolerate cheap callbacks; any rate limiting beyond the
//! interval logic here is the CLI layer's concern.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Core trait for progress reporting
///
/// Implementations must be thread-safe; hashing stages report from worker
/// threads.
pub trait ProgressTracker: Send + Sync {
    /// Report that `processed` of `total` units of `stage` are done
    fn report(&self, stage: &str, processed: u64, total: u64);

    /// Mark the whole operation finished with a closing message
    fn finish(&self, message: &str);
}

/// Silent progress tracker (no-op)
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported position, for tests
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }
}

impl ProgressTracker for SilentProgress {
    fn report(&self, _stage: &str, processed: u64, _total: u64) {
        self.position.store(processed, Ordering::Relaxed);
    }

    fn finish(&self, _message: &str) {}
}

/// Logging progress tracker
///
/// Logs to tracing at info level, at most ~10 lines per stage to avoid
/// spam in long runs.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_logged: AtomicU64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for LogProgress {
    fn report(&self, stage: &str, processed: u64, total: u64) {
        let interval = std::cmp::max(1, total / 10);
        let last = self.last_logged.load(Ordering::Relaxed);
        if processed / interval > last / interval || processed == total {
            self.last_logged.store(processed, Ordering::Relaxed);
            if total > 0 {
                info!("{}: {}% ({}/{})", stage, processed * 100 / total, processed, total);
            }
        }
    }

    fn finish(&self, message: &str) {
        info!("{}", message);
    }
}

/// Visual progress bars using indicatif
///
/// One bar at a time; a new stage label swaps the bar.
pub struct CliProgress {
    bar: Mutex<Option<(String, ProgressBar)>>,
}

impl CliProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:20} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker for CliProgress {
    fn report(&self, stage: &str, processed: u64, total: u64) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };

        let stale = match guard.as_ref() {
            Some((current, _)) => current != stage,
            None => true,
        };
        if stale {
            if let Some((_, old)) = guard.take() {
                old.finish_and_clear();
            }
            let bar = ProgressBar::new(total);
            bar.set_style(Self::style());
            bar.set_message(stage.to_string());
            *guard = Some((stage.to_string(), bar));
        }

        if let Some((_, bar)) = guard.as_ref() {
            bar.set_position(processed);
        }
    }

    fn finish(&self, message: &str) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some((_, bar)) = guard.take()
        {
            bar.finish_with_message(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_tracks_position() {
        let progress = SilentProgress::new();
        progress.report("hash", 3, 10);
        progress.report("hash", 7, 10);
        assert_eq!(progress.position(), 7);
        progress.finish("done");
    }

    #[test]
    fn test_log_progress_tolerates_rapid_reports() {
        let progress = LogProgress::new();
        for i in 0..=1000 {
            progress.report("rename", i, 1000);
        }
        progress.finish("rename complete");
    }

    #[test]
    fn test_cli_progress_stage_swap() {
        let progress = CliProgress::new();
        progress.report("hash", 1, 4);
        progress.report("hash", 2, 4);
        progress.report("move", 1, 2);
        progress.finish("done");
    }
}
