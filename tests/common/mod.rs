// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use btidy::WorkflowOptions;
use btidy::metadir::META_DIR_NAME;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create an empty root directory. Keep the TempDir alive to prevent
/// cleanup.
pub fn setup_root() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Write `content` at `rel` under the root, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Set a file's mtime from an RFC 3339 timestamp.
pub fn set_mtime(path: &Path, rfc3339: &str) {
    let when = chrono::DateTime::parse_from_rfc3339(rfc3339).unwrap();
    filetime::set_file_mtime(path, FileTime::from_unix_time(when.timestamp(), 0)).unwrap();
}

/// Default options: silent progress, snapshots on, single hash worker
/// for determinism.
pub fn test_options() -> WorkflowOptions {
    WorkflowOptions {
        hash_config: btidy::HashConfig::with_workers(1),
        ..Default::default()
    }
}

/// Paths of the per-run trash directories under a root.
pub fn trash_run_dirs(root: &Path) -> Vec<PathBuf> {
    let trash = root.join(META_DIR_NAME).join("trash");
    if !trash.exists() {
        return Vec::new();
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(&trash)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Active journal files under a root.
pub fn active_journals(root: &Path) -> Vec<PathBuf> {
    btidy::workflow::journal::list_active(&root.join(META_DIR_NAME).join("journal")).unwrap()
}

/// Names of the regular files directly at the root (not in `.btidy/`).
pub fn root_file_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
