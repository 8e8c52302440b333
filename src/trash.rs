// src/trash.rs

//! Run-scoped soft delete
//!
//! Nothing the engine does is a permanent delete: files are moved into
//! `<root>/.btidy/trash/<runID>/<rel>`, preserving their relative layout
//! so that restore is exactly symmetric to trash. Only the purge reducer
//! removes trash, and only on explicit request.

use crate::error::{Error, Result};
use crate::filesystem::SafePath;
use crate::metadir::{MetaDir, RunId};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Soft-delete into a per-run trash directory
pub struct Trasher {
    safe: SafePath,
    trash_dir: PathBuf,
}

impl Trasher {
    /// Create the trasher for `run`, creating its trash directory eagerly
    pub fn create(safe: &SafePath, meta: &MetaDir, run: &RunId) -> Result<Self> {
        let trash_dir = meta.trash_dir(run);
        fs::create_dir_all(&trash_dir).map_err(|e| Error::io(&trash_dir, e))?;
        Ok(Self {
            safe: safe.clone(),
            trash_dir,
        })
    }

    /// This run's trash directory
    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    /// Trash destination for `path`, without moving anything
    ///
    /// Used for journaling the destination of a pending trash move.
    pub fn dest_for(&self, path: &Path) -> Result<PathBuf> {
        let rel = self.safe.rel_of(path)?;
        Ok(self.trash_dir.join(rel))
    }

    /// Move `path` into this run's trash, mirroring its relative layout
    ///
    /// Returns the trash destination. Fails with `AlreadyExists` if the
    /// destination is occupied; run ids are unique, so that can only
    /// happen through concurrent misuse.
    pub fn trash(&self, path: &Path) -> Result<PathBuf> {
        let dest = self.dest_for(path)?;
        self.safe.safe_rename(path, &dest)?;
        debug!("trashed {} -> {}", path.display(), dest.display());
        Ok(dest)
    }

    /// Move a trashed file back to its original location
    ///
    /// Refuses paths outside this run's trash directory and never
    /// overwrites a live file. Returns the restored original path.
    pub fn restore(&self, trashed: &Path) -> Result<PathBuf> {
        let rel = trashed
            .strip_prefix(&self.trash_dir)
            .map_err(|_| Error::NotInTrash(trashed.display().to_string()))?;

        let original = self.safe.root().join(rel);
        if fs::symlink_metadata(&original).is_ok() {
            return Err(Error::AlreadyExists(original.display().to_string()));
        }

        self.safe.safe_rename(trashed, &original)?;
        debug!("restored {} -> {}", trashed.display(), original.display());
        Ok(original)
    }

    /// Restore every file in this run's trash
    ///
    /// Returns `(trashed, original)` pairs in walk order.
    pub fn restore_all(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut restored = Vec::new();

        for entry in WalkDir::new(&self.trash_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::IoError(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let original = self.restore(entry.path())?;
            restored.push((entry.path().to_path_buf(), original));
        }

        Ok(restored)
    }

    /// Irreversibly delete this run's trash directory
    pub fn purge(self) -> Result<()> {
        self.safe.safe_remove_dir_all(&self.trash_dir)
    }
}
