// src/filesystem/mod.rs

//! Filesystem primitives for btidy
//!
//! File records produced by the walker, the containment validator, and
//! the atomic move primitive every mutation goes through.

pub mod path;
pub mod walk;

pub use path::SafePath;
pub use walk::collect_files;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// One collected file, as handed to executors
///
/// Created by the walker, owned by the workflow runner for the life of a
/// request, borrowed by executors.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path
    pub path: PathBuf,
    /// Absolute parent directory
    pub dir: PathBuf,
    /// File name component
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time
    pub mtime: DateTime<Utc>,
}

impl FileRecord {
    /// Build a record by stating `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
        let dir = path
            .parent()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no parent", path.display())))?
            .to_path_buf();
        let name = path
            .file_name()
            .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", path.display())))?
            .to_string_lossy()
            .into_owned();
        let mtime = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            path: path.to_path_buf(),
            dir,
            name,
            size: meta.len(),
            mtime,
        })
    }
}

/// Move a file atomically, falling back to copy+sync+delete when the
/// rename crosses filesystems.
///
/// Uses fsync on the destination (and best-effort on its directory)
/// before removing the source, so the fallback is durable.
pub fn move_file_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(
                "cross-filesystem move ({} -> {}), using copy fallback",
                src.display(),
                dst.display()
            );

            fs::copy(src, dst)?;

            let file = File::open(dst)?;
            file.sync_all()?;
            drop(file);

            // Not all filesystems support fsync on directories.
            if let Some(parent) = dst.parent()
                && let Ok(dir) = File::open(parent)
            {
                let _ = dir.sync_all();
            }

            fs::remove_file(src)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

// EXDEV: 18 on Linux and macOS.
fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(18)
}
