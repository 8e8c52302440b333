// src/manifest.rs

//! SHA-256 inventory of a file list
//!
//! A manifest records `{path, hash, size, mtime}` for every collected
//! file, with entries sorted by relative path. The workflow saves one to
//! `.btidy/manifests/<runID>.json` before mutating (the snapshot); it
//! exists for post-hoc forensic comparison and is never consumed by undo.

use crate::error::{Error, Result};
use crate::filesystem::{FileRecord, SafePath};
use crate::hash::{self, HashConfig, HashMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::warn;

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// One inventoried file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the root
    pub path: String,
    /// Hex SHA-256 of the file's content
    pub hash: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

/// SHA-256 inventory with sorted entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub root_path: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest for `files`, hashing in parallel
    ///
    /// Files that fail to hash (raced deletions, permission changes) are
    /// logged and omitted rather than failing the whole inventory.
    pub fn generate(safe: &SafePath, files: &[FileRecord], config: HashConfig) -> Result<Self> {
        let inputs: Vec<_> = files.iter().map(|f| (f.path.clone(), f.size)).collect();
        let mut hashes: HashMap<_, _> = HashMap::new();

        for result in hash::hash_files(inputs, HashMode::Full, config)? {
            match result.hash {
                Ok(digest) => {
                    hashes.insert(result.path, digest);
                }
                Err(e) => warn!("omitting {} from manifest: {}", result.path.display(), e),
            }
        }

        let mut entries = Vec::with_capacity(hashes.len());
        for file in files {
            let Some(digest) = hashes.remove(&file.path) else {
                continue;
            };
            let rel = safe.rel_of(&file.path)?;
            entries.push(ManifestEntry {
                path: rel.to_string_lossy().into_owned(),
                hash: digest,
                size: file.size,
                mtime: file.mtime,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(Self {
            version: MANIFEST_VERSION,
            created_at: Utc::now(),
            root_path: safe.root().to_string_lossy().into_owned(),
            entries,
        })
    }

    /// Save as JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a previously saved manifest
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let manifest: Self = serde_json::from_reader(BufReader::new(file))?;
        Ok(manifest)
    }

    /// The set of distinct content hashes in this inventory
    pub fn unique_hashes(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.hash.as_str()).collect()
    }
}
