// src/filesystem/walk.rs

//! Directory walker producing the file list for a workflow
//!
//! Walks the root without following symlinks, excludes the `.btidy/`
//! metadata subtree, and yields regular files only, in deterministic
//! (byte-wise file name) order.

use super::FileRecord;
use crate::error::{Error, Result};
use crate::metadir::META_DIR_NAME;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Collect every regular file under `root` into [`FileRecord`]s
///
/// Unreadable entries are logged and skipped rather than failing the
/// whole walk; symlinks are never followed and never collected.
pub fn collect_files(root: &Path) -> Result<Vec<FileRecord>> {
    let mut records = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != META_DIR_NAME);

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match FileRecord::from_path(entry.path()) {
            Ok(record) => records.push(record),
            Err(Error::IoError(msg)) => {
                warn!("skipping {}: {}", entry.path().display(), msg);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(records)
}
