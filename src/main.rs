// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use btidy::Request;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rename(args) => commands::cmd_mutate(Request::Rename, &args),
        Commands::Flatten(args) => commands::cmd_mutate(Request::Flatten, &args),
        Commands::Organize(args) => commands::cmd_mutate(Request::Organize, &args),
        Commands::Duplicate(args) => commands::cmd_mutate(Request::Duplicate, &args),
        Commands::Unzip(args) => commands::cmd_mutate(Request::Unzip, &args),
        Commands::Undo {
            dir,
            run_id,
            dry_run,
        } => commands::cmd_undo(&dir, run_id, dry_run),
        Commands::Purge {
            dir,
            run_id,
            older_than,
            all,
            force,
            dry_run,
        } => commands::cmd_purge(&dir, run_id, older_than, all, force, dry_run),
        Commands::Runs { dir } => commands::cmd_runs(&dir),
        Commands::Validate { dir, run_id } => commands::cmd_validate(&dir, run_id),
    }
}
