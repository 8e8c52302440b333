// src/cli.rs
//! CLI definitions for btidy
//!
//! This module contains all command-line interface definitions using
//! clap. The actual command implementations are in the `commands`
//! module.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "btidy")]
#[command(author = "btidy Project")]
#[command(version)]
#[command(about = "Bulk directory tidying with reversible operations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every mutating command
#[derive(Args, Debug, Clone)]
pub struct MutateArgs {
    /// Target directory
    pub dir: String,

    /// Show what would change without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the pre-operation manifest snapshot
    #[arg(long)]
    pub no_snapshot: bool,

    /// Hashing worker count (0 = number of CPUs)
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Suppress progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rename files to <date>_<slug>.<ext> canonical form
    Rename(MutateArgs),

    /// Move every file in a subdirectory up to the root
    Flatten(MutateArgs),

    /// Group files into per-extension directories
    Organize(MutateArgs),

    /// Trash files whose content duplicates another file
    Duplicate(MutateArgs),

    /// Extract .zip archives and trash the originals
    Unzip(MutateArgs),

    /// Reverse the newest run (or a specific one) from its journal
    Undo {
        /// Target directory
        dir: String,

        /// Undo this run instead of the newest one
        #[arg(long)]
        run_id: Option<String>,

        /// Perform every check but move nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Irreversibly remove trash runs
    Purge {
        /// Target directory
        dir: String,

        /// Only this run
        #[arg(long)]
        run_id: Option<String>,

        /// Only runs older than this, e.g. 1000h or 30d
        #[arg(long)]
        older_than: Option<String>,

        /// Every run (requires --force outside --dry-run)
        #[arg(long)]
        all: bool,

        /// Confirm purging every run
        #[arg(long)]
        force: bool,

        /// List what would be purged without removing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List trash runs and journal state for a root
    Runs {
        /// Target directory
        dir: String,
    },

    /// Check journal integrity (unmatched intents)
    Validate {
        /// Target directory
        dir: String,

        /// Validate this run's journal only
        #[arg(long)]
        run_id: Option<String>,
    },
}
