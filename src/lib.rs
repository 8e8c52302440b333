// src/lib.rs

//! btidy: bulk directory tidying with full reversibility
//!
//! A command-line engine that reorganizes a target directory through a
//! fixed set of bulk mutations (extracting archives, renaming to a
//! canonical form, flattening a tree, grouping by extension, and
//! deduplicating by content hash), every one of them reversible until
//! the user explicitly purges trash.
//!
//! # Architecture
//!
//! - Safe mutation only: every path is validated against the root's real
//!   (symlink-resolved) form before anything moves
//! - Run-scoped trash: deletes are moves into
//!   `.btidy/trash/<runID>/<rel>`, preserving relative layout
//! - Intent/confirmation journal: append-only JSONL, fsynced per line,
//!   consumed in reverse by undo
//! - Pre-operation manifest snapshot: SHA-256 inventory for forensics
//! - One advisory lock per root serializes concurrent runs

mod error;

pub mod executors;
pub mod filesystem;
pub mod hash;
pub mod lock;
pub mod manifest;
pub mod metadir;
pub mod progress;
pub mod trash;
pub mod workflow;

pub use error::{Error, Result};
pub use executors::{ExecContext, OpCounts, OpStatus, Operation, Request};
pub use filesystem::{FileRecord, SafePath, collect_files};
pub use hash::{HashConfig, HashMode, HashResult};
pub use lock::RootLock;
pub use manifest::{Manifest, ManifestEntry};
pub use metadir::{CommandKind, MetaDir, RunId};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use trash::Trasher;
pub use workflow::journal::{EntryKind, JournalEntry, JournalWriter, RunJournal};
pub use workflow::purge::{PurgeOptions, PurgeReport, TrashRun};
pub use workflow::undo::{UndoAction, UndoOptions, UndoOutcome, UndoReport};
pub use workflow::{WorkflowOptions, WorkflowOutcome};
