// src/error.rs

//! Crate-wide error type
//!
//! Every error the engine produces is a tagged variant here. Payloads are
//! strings rather than wrapped source errors so that per-operation results
//! stay `Clone` and can be carried inside operation lists and reports.

use std::path::Path;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All error kinds the engine can produce
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// An absolute or `..` path leaves the root. Local to one operation;
    /// reclassified to fatal by the workflow runner when present.
    #[error("path escapes root: {0}")]
    PathEscape(String),

    /// A symlink resolves outside the root. Same policy as `PathEscape`.
    #[error("symlink escapes root: {0}")]
    SymlinkEscape(String),

    /// Another process holds the per-root lock. Fatal before any mutation.
    #[error("another process holds the lock on this root: {0}")]
    LockContended(String),

    /// Undo found trashed bytes that no longer match the journaled hash.
    #[error("hash mismatch for {path}: journal {expected}, on disk {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Journal validation found an intent without a matching confirmation.
    #[error("journal has an unconfirmed intent: {0}")]
    PartialWrite(String),

    /// Undo found no journal to replay.
    #[error("no active journals under {0}")]
    NoActiveJournals(String),

    /// Restore was handed a path outside this run's trash directory.
    #[error("path is not inside this run's trash: {0}")]
    NotInTrash(String),

    /// Archive entry uses a compression method this build cannot decode.
    #[error("unsupported compression method {method} for archive entry {entry}")]
    UnsupportedMethod { entry: String, method: u16 },

    /// The workflow detected containment escapes among executed operations.
    #[error("unsafe operations detected: {0}")]
    UnsafeOperation(String),

    /// Underlying read/write/rename/fsync failure.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A path is malformed for the requested operation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Serialization or line-format failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Invalid duration, run filter, or option combination.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// A destination that must not exist already does.
    #[error("destination already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// I/O error with the failing path attached
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::IoError(format!("{}: {}", path.display(), err))
    }

    /// True for the containment escapes the workflow reclassifies to fatal
    pub fn is_escape(&self) -> bool {
        matches!(self, Self::PathEscape(_) | Self::SymlinkEscape(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}
