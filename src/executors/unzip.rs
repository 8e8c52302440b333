// src/executors/unzip.rs

//! Archive extraction
//!
//! Extracts each `.zip` file in the list into a sibling directory named
//! after the archive stem, then trashes the archive so undo can bring it
//! back. Entry names come from untrusted input, so every one passes
//! through sanitization and the containment validator before a byte is
//! written:
//!
//! - entries escaping the root (absolute names, `..`) are skipped with a
//!   reason naming the escape; siblings still extract
//! - symlink entries are always refused, even ones that would resolve
//!   inside the root
//! - entries using a compression method this build cannot decode
//!   (deflate64 without the fallback feature) are skipped per entry
//!
//! The journal sees one `mkdir` for the extraction directory, one
//! `extract` per written file, and one `trash` for the archive once at
//! least one entry landed.

use super::{ExecContext, Operation};
use crate::error::{Error, Result};
use crate::filesystem::FileRecord;
use crate::hash;
use crate::workflow::journal::EntryKind;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use zip::result::ZipError;

fn zip_error(path: &Path, err: ZipError) -> Error {
    match err {
        ZipError::Io(e) => Error::io(path, e),
        other => Error::ParseError(format!("{}: {}", path.display(), other)),
    }
}

/// Pick an extraction directory next to the archive: the archive stem,
/// or the first free `<stem>_<n>` when that name is taken.
fn extraction_dir(archive: &FileRecord) -> PathBuf {
    let (stem, _) = super::split_name(&archive.name);
    let base = archive.dir.join(&stem);
    if fs::symlink_metadata(&base).is_err() {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = archive.dir.join(format!("{}_{}", stem, n));
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        n += 1;
    }
}

/// An entry that passed every check and is cleared for extraction
struct PlannedEntry {
    index: usize,
    target: PathBuf,
    is_dir: bool,
}

pub fn execute(ctx: &ExecContext<'_>) -> Result<Vec<Operation>> {
    let archives: Vec<&FileRecord> = ctx
        .files
        .iter()
        .filter(|f| {
            Path::new(&f.name)
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
        })
        .collect();

    let total = archives.len() as u64;
    let mut operations = Vec::new();

    for (i, archive) in archives.iter().enumerate() {
        ctx.progress.report("unzip", i as u64 + 1, total);
        extract_archive(ctx, archive, &mut operations)?;
    }

    Ok(operations)
}

fn extract_archive(
    ctx: &ExecContext<'_>,
    archive: &FileRecord,
    operations: &mut Vec<Operation>,
) -> Result<()> {
    let file = match File::open(&archive.path) {
        Ok(f) => f,
        Err(e) => {
            operations.push(Operation::failed(
                EntryKind::Extract,
                &archive.path,
                Error::io(&archive.path, e),
            ));
            return Ok(());
        }
    };

    let mut zip = match zip::ZipArchive::new(file) {
        Ok(z) => z,
        Err(e) => {
            operations.push(Operation::failed(
                EntryKind::Extract,
                &archive.path,
                zip_error(&archive.path, e),
            ));
            return Ok(());
        }
    };

    let dest_dir = extraction_dir(archive);
    let mut planned = Vec::new();

    // Validation pass: metadata only, nothing decompressed yet.
    for index in 0..zip.len() {
        let entry = match zip.by_index_raw(index) {
            Ok(e) => e,
            Err(e) => {
                operations.push(Operation::failed(
                    EntryKind::Extract,
                    &archive.path,
                    zip_error(&archive.path, e),
                ));
                continue;
            }
        };
        let name = entry.name().to_string();

        if entry.is_symlink() {
            operations.push(Operation::skipped(
                EntryKind::Extract,
                &archive.path,
                format!("symlink entry refused: {}", name),
            ));
            continue;
        }

        if let zip::CompressionMethod::Unsupported(method) = entry.compression() {
            warn!(
                "{}: entry {} uses unsupported method {}",
                archive.path.display(),
                name,
                method
            );
            operations.push(Operation::skipped(
                EntryKind::Extract,
                &archive.path,
                Error::UnsupportedMethod {
                    entry: name,
                    method,
                }
                .to_string(),
            ));
            continue;
        }

        let target = match ctx.safe.resolve_safe(&dest_dir, Path::new(&name)) {
            Ok(t) => t,
            Err(Error::PathEscape(_)) | Err(Error::SymlinkEscape(_)) => {
                operations.push(Operation::skipped(
                    EntryKind::Extract,
                    &archive.path,
                    format!("entry escapes extraction root: {}", name),
                ));
                continue;
            }
            Err(e) => {
                operations.push(Operation::skipped(
                    EntryKind::Extract,
                    &archive.path,
                    format!("entry {} rejected: {}", name, e),
                ));
                continue;
            }
        };

        planned.push(PlannedEntry {
            index,
            target,
            is_dir: entry.is_dir(),
        });
    }

    if planned.is_empty() {
        // Every entry was refused; the archive stays in place.
        return Ok(());
    }

    let mkdir_intent = ctx.log_intent(EntryKind::Mkdir, &dest_dir, None, None)?;
    if !ctx.dry_run
        && let Err(e) = ctx.safe.safe_mkdir_all(&dest_dir)
    {
        // The unconfirmed intent marks the journal as partial.
        operations.push(Operation::failed(EntryKind::Mkdir, &dest_dir, e));
        return Ok(());
    }
    ctx.log_confirmation(&mkdir_intent)?;
    operations.push(Operation::ok(EntryKind::Mkdir, &dest_dir));

    let mut written = 0usize;
    for entry in &planned {
        if entry.is_dir {
            if !ctx.dry_run && let Err(e) = ctx.safe.safe_mkdir_all(&entry.target) {
                operations.push(Operation::failed(EntryKind::Extract, &archive.path, e));
            }
            continue;
        }

        let intent = ctx.log_intent(
            EntryKind::Extract,
            &archive.path,
            Some(&entry.target),
            None,
        )?;

        if ctx.dry_run {
            written += 1;
            operations.push(
                Operation::ok(EntryKind::Extract, &archive.path).with_dst(&entry.target),
            );
            continue;
        }

        match write_entry(&mut zip, entry, &archive.path) {
            Ok(()) => {
                ctx.log_confirmation(&intent)?;
                written += 1;
                operations.push(
                    Operation::ok(EntryKind::Extract, &archive.path).with_dst(&entry.target),
                );
            }
            Err(e) => {
                operations.push(Operation::failed(EntryKind::Extract, &archive.path, e));
            }
        }
    }

    if written == 0 {
        return Ok(());
    }

    // The archive itself is soft-deleted; its hash lets undo verify the
    // trashed bytes before restoring.
    let digest = match hash::hash_file(&archive.path) {
        Ok(d) => d,
        Err(e) => {
            operations.push(Operation::failed_preparation(&archive.path, e));
            return Ok(());
        }
    };
    operations.push(super::trash_file(ctx, &archive.path, &digest)?);

    Ok(())
}

fn write_entry(
    zip: &mut zip::ZipArchive<File>,
    entry: &PlannedEntry,
    archive_path: &Path,
) -> Result<()> {
    let mut reader = zip
        .by_index(entry.index)
        .map_err(|e| zip_error(archive_path, e))?;

    if let Some(parent) = entry.target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // create_new is atomic: an occupant means a name clash inside the
    // fresh extraction dir, which we refuse rather than overwrite.
    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&entry.target)
        .map_err(|e| Error::io(&entry.target, e))?;

    io::copy(&mut reader, &mut out).map_err(|e| Error::io(&entry.target, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extraction_dir_prefers_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photos.zip");
        fs::write(&path, b"").unwrap();
        let record = FileRecord::from_path(&path).unwrap();

        assert_eq!(extraction_dir(&record), dir.path().join("photos"));
    }

    #[test]
    fn test_extraction_dir_suffixes_on_collision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photos.zip");
        fs::write(&path, b"").unwrap();
        fs::create_dir(dir.path().join("photos")).unwrap();
        let record = FileRecord::from_path(&path).unwrap();

        assert_eq!(extraction_dir(&record), dir.path().join("photos_1"));
    }
}
