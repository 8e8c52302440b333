// src/hash.rs

//! SHA-256 hashing for file integrity and duplicate detection
//!
//! Two primitives back every content check in the engine:
//!
//! - **Full hash**: streaming SHA-256 of the whole byte stream. Used for
//!   journal verification, manifests, and duplicate confirmation.
//! - **Partial hash**: SHA-256 of the first 4096 bytes followed by the
//!   last 4096 bytes. A cheap pre-filter that narrows duplicate candidate
//!   groups before the full hash confirms them.
//!
//! Bulk hashing fans out over a rayon pool sized by [`HashConfig`];
//! results come back as an unordered sequence, so callers that need
//! determinism must re-sort by path after collection.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Chunk size for partial hashing
pub const PARTIAL_CHUNK: u64 = 4096;

/// Which hash to compute for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashMode {
    /// Hash the entire byte stream
    #[default]
    Full,
    /// Hash first and last [`PARTIAL_CHUNK`] bytes
    Partial,
}

/// Configuration for bulk hashing
#[derive(Debug, Clone, Copy, Default)]
pub struct HashConfig {
    /// Worker pool size; 0 means the number of available CPUs
    pub workers: usize,
}

impl HashConfig {
    /// Create a config with an explicit worker count
    pub fn with_workers(workers: usize) -> Self {
        Self { workers }
    }

    fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        }
    }
}

/// One per-file outcome from bulk hashing
#[derive(Debug)]
pub struct HashResult {
    pub path: PathBuf,
    pub size: u64,
    /// Hex digest, or the first error encountered for this file
    pub hash: Result<String>,
}

/// Compute the SHA-256 of a byte slice as lowercase hex
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the full SHA-256 of a file's byte stream
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the partial SHA-256 of a file
///
/// Defined as SHA-256 of `first_4096_bytes || last_4096_bytes`. Files of
/// at most 4096 bytes hash their entire content (identical to the full
/// hash for them); files between 4097 and 8192 bytes hash their first
/// chunk only, so the two windows never overlap.
pub fn hash_file_partial(path: &Path, size: u64) -> Result<String> {
    if size <= PARTIAL_CHUNK {
        return hash_file(path);
    }

    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut chunk = vec![0u8; PARTIAL_CHUNK as usize];

    file.read_exact(&mut chunk).map_err(|e| Error::io(path, e))?;
    hasher.update(&chunk);

    if size > 2 * PARTIAL_CHUNK {
        file.seek(SeekFrom::End(-(PARTIAL_CHUNK as i64)))
            .map_err(|e| Error::io(path, e))?;
        file.read_exact(&mut chunk).map_err(|e| Error::io(path, e))?;
        hasher.update(&chunk);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash a list of `(path, size)` pairs in parallel
///
/// Fans out over a dedicated rayon pool sized by `config` and delivers
/// results through an unordered sequence; the producer closes it once
/// every input has been visited. Each result carries either the digest or
/// the first error encountered for that file.
pub fn hash_files(
    inputs: Vec<(PathBuf, u64)>,
    mode: HashMode,
    config: HashConfig,
) -> Result<impl Iterator<Item = HashResult>> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.effective_workers())
        .build()
        .map_err(|e| Error::ConfigError(format!("failed to build hash worker pool: {}", e)))?;

    let (tx, rx) = mpsc::channel();
    pool.install(|| {
        inputs.into_par_iter().for_each_with(tx, |tx, (path, size)| {
            let hash = match mode {
                HashMode::Full => hash_file(&path),
                HashMode::Partial => hash_file_partial(&path, size),
            };
            // Receiver outlives the pool; a send can only fail if the
            // caller dropped the iterator, which makes the result moot.
            let _ = tx.send(HashResult { path, size, hash });
        });
    });

    Ok(rx.into_iter())
}

/// Hash a list of `(path, size)` pairs and return results sorted by path
///
/// Convenience wrapper for callers that need deterministic order
/// (manifests, duplicate grouping).
pub fn hash_files_sorted(
    inputs: Vec<(PathBuf, u64)>,
    mode: HashMode,
    config: HashConfig,
) -> Result<Vec<HashResult>> {
    let mut results: Vec<HashResult> = hash_files(inputs, mode, config)?.collect();
    results.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_hash_bytes_known_value() {
        assert_eq!(
            hash_bytes(b"Hello, World!"),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.txt", b"Hello, World!");
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"Hello, World!"));
    }

    #[test]
    fn test_partial_equals_full_for_small_files() {
        let dir = TempDir::new().unwrap();
        let content = vec![7u8; 4096];
        let path = write_file(&dir, "small.bin", &content);
        assert_eq!(
            hash_file_partial(&path, 4096).unwrap(),
            hash_file(&path).unwrap()
        );
    }

    #[test]
    fn test_partial_uses_first_chunk_only_in_middle_range() {
        let dir = TempDir::new().unwrap();
        // 6000 bytes: first 4096 identical, tails differ. Partial hashes
        // must match because only the first chunk is considered.
        let mut a = vec![1u8; 6000];
        let mut b = vec![1u8; 6000];
        a[5999] = 2;
        b[5999] = 3;
        let pa = write_file(&dir, "a.bin", &a);
        let pb = write_file(&dir, "b.bin", &b);
        assert_eq!(
            hash_file_partial(&pa, 6000).unwrap(),
            hash_file_partial(&pb, 6000).unwrap()
        );
        assert_ne!(hash_file(&pa).unwrap(), hash_file(&pb).unwrap());
    }

    #[test]
    fn test_partial_sees_tail_for_large_files() {
        let dir = TempDir::new().unwrap();
        let mut a = vec![1u8; 20000];
        let mut b = vec![1u8; 20000];
        a[19999] = 2;
        b[19999] = 3;
        let pa = write_file(&dir, "a.bin", &a);
        let pb = write_file(&dir, "b.bin", &b);
        assert_ne!(
            hash_file_partial(&pa, 20000).unwrap(),
            hash_file_partial(&pb, 20000).unwrap()
        );
    }

    #[test]
    fn test_hash_files_parallel() {
        let dir = TempDir::new().unwrap();
        let mut inputs = Vec::new();
        for i in 0..20 {
            let content = format!("content {}", i);
            let path = write_file(&dir, &format!("f{}.txt", i), content.as_bytes());
            inputs.push((path, content.len() as u64));
        }

        let results =
            hash_files_sorted(inputs.clone(), HashMode::Full, HashConfig::default()).unwrap();
        assert_eq!(results.len(), 20);
        for r in &results {
            assert_eq!(r.hash.as_ref().unwrap().len(), 64);
        }

        // Explicit single worker yields the same digests.
        let serial =
            hash_files_sorted(inputs, HashMode::Full, HashConfig::with_workers(1)).unwrap();
        for (a, b) in results.iter().zip(serial.iter()) {
            assert_eq!(a.path, b.path);
            assert_eq!(a.hash.as_ref().unwrap(), b.hash.as_ref().unwrap());
        }
    }

    #[test]
    fn test_hash_files_reports_per_file_errors() {
        let dir = TempDir::new().unwrap();
        let good = write_file(&dir, "good.txt", b"ok");
        let missing = dir.path().join("missing.txt");

        let results = hash_files_sorted(
            vec![(good, 2), (missing, 0)],
            HashMode::Full,
            HashConfig::default(),
        )
        .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|r| r.hash.is_err()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.hash.is_ok()).count(), 1);
    }
}
