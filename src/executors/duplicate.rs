// src/executors/duplicate.rs

//! Content deduplication
//!
//! Narrows duplicate candidates in three stages so the expensive work
//! only touches plausible groups: group by size, subdivide by partial
//! hash, confirm by full hash. Within each confirmed group the
//! lexicographically smallest path survives and every other member is
//! trashed, with the full hash journaled so undo can verify the trashed
//! bytes before restoring.

use super::{ExecContext, Operation};
use crate::error::Result;
use crate::filesystem::FileRecord;
use crate::hash::{self, HashMode};
use std::collections::HashMap;
use std::path::PathBuf;

pub fn execute(ctx: &ExecContext<'_>) -> Result<Vec<Operation>> {
    let mut operations = Vec::new();

    // Stage 1: size groups.
    let mut by_size: HashMap<u64, Vec<&FileRecord>> = HashMap::new();
    for file in ctx.files {
        by_size.entry(file.size).or_default().push(file);
    }
    let candidates: Vec<&FileRecord> = by_size
        .into_values()
        .filter(|group| group.len() > 1)
        .flatten()
        .collect();

    if candidates.is_empty() {
        return Ok(operations);
    }

    // Stage 2: partial hashes narrow the size groups.
    ctx.progress.report("hash (partial)", 0, candidates.len() as u64);
    let inputs: Vec<(PathBuf, u64)> = candidates
        .iter()
        .map(|f| (f.path.clone(), f.size))
        .collect();
    let mut partial: HashMap<PathBuf, String> = HashMap::new();
    let mut processed = 0u64;
    for result in hash::hash_files(inputs, HashMode::Partial, ctx.hash_config)? {
        processed += 1;
        ctx.progress
            .report("hash (partial)", processed, candidates.len() as u64);
        match result.hash {
            Ok(digest) => {
                partial.insert(result.path, digest);
            }
            // Hash stage only; no trash was ever attempted for this file.
            Err(e) => operations.push(Operation::failed_preparation(result.path, e)),
        }
    }

    let mut by_partial: HashMap<(u64, String), Vec<&FileRecord>> = HashMap::new();
    for file in &candidates {
        if let Some(digest) = partial.get(&file.path) {
            by_partial
                .entry((file.size, digest.clone()))
                .or_default()
                .push(*file);
        }
    }
    let confirmable: Vec<&FileRecord> = by_partial
        .into_values()
        .filter(|group| group.len() > 1)
        .flatten()
        .collect();

    if confirmable.is_empty() {
        return Ok(operations);
    }

    // Stage 3: full hashes confirm.
    ctx.progress.report("hash (full)", 0, confirmable.len() as u64);
    let inputs: Vec<(PathBuf, u64)> = confirmable
        .iter()
        .map(|f| (f.path.clone(), f.size))
        .collect();
    let mut full: HashMap<PathBuf, String> = HashMap::new();
    let mut processed = 0u64;
    for result in hash::hash_files(inputs, HashMode::Full, ctx.hash_config)? {
        processed += 1;
        ctx.progress
            .report("hash (full)", processed, confirmable.len() as u64);
        match result.hash {
            Ok(digest) => {
                full.insert(result.path, digest);
            }
            // Hash stage only; no trash was ever attempted for this file.
            Err(e) => operations.push(Operation::failed_preparation(result.path, e)),
        }
    }

    let mut groups: HashMap<String, Vec<&FileRecord>> = HashMap::new();
    for file in &confirmable {
        if let Some(digest) = full.get(&file.path) {
            groups.entry(digest.clone()).or_default().push(*file);
        }
    }

    // Deterministic order: survivor is the smallest path, duplicates are
    // trashed in path order, groups processed in hash order.
    let mut confirmed: Vec<(String, Vec<&FileRecord>)> = groups
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .collect();
    confirmed.sort_by(|a, b| a.0.cmp(&b.0));

    for (digest, mut group) in confirmed {
        group.sort_by(|a, b| a.path.cmp(&b.path));
        for duplicate in &group[1..] {
            operations.push(super::trash_file(ctx, &duplicate.path, &digest)?);
        }
    }

    Ok(operations)
}
