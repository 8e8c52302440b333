// src/lock.rs

//! Per-root advisory lock
//!
//! One exclusive, whole-file advisory lock on `<root>/.btidy/lock`
//! serializes workflows on the same root. Acquisition is non-blocking:
//! contention is an immediate, user-visible error rather than a wait.
//! The lock defends against concurrent processes on the same machine
//! only; it is not multi-host safe.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive advisory lock held for the duration of a workflow
///
/// Released on drop; the lock file is removed from disk on clean
/// release.
pub struct RootLock {
    file: File,
    path: PathBuf,
}

impl RootLock {
    /// Try to acquire the lock without blocking
    ///
    /// Contention maps to [`Error::LockContended`]; any other failure is
    /// an I/O error.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = File::create(path).map_err(|e| Error::io(path, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("acquired root lock at {}", path.display());
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(Error::LockContended(path.display().to_string()))
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        // Unlock before unlink so a waiter that already opened the file
        // observes the release.
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
        debug!("released root lock at {}", self.path.display());
    }
}
