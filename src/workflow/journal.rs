// src/workflow/journal.rs

//! Append-only run journal
//!
//! One JSON object per line, UTF-8. Every successful mutation contributes
//! two entries with identical `(type, src, dst)`: an **intent** with
//! `ok=false` and a **confirmation** with `ok=true`, in that order. The
//! sequence per mutation is strict: intent line (fsynced), filesystem op,
//! confirmation line (fsynced). A crash or failure between the two marks
//! the run as partial; `validate` detects exactly that, and every
//! mutation completed before the crash stays replayable by undo.
//!
//! Active journals live at `.btidy/journal/<runID>.jsonl`; a successful
//! undo renames them to `<runID>.rolled-back.jsonl` so they can never be
//! applied twice.

use crate::error::{Error, Result};
use crate::filesystem::SafePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// File suffix of a journal consumed by undo
pub const ROLLED_BACK_SUFFIX: &str = ".rolled-back.jsonl";

/// Journal entry type; maps one-to-one onto the mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Trash,
    Rename,
    Extract,
    Mkdir,
    Replace,
}

/// One journal line
///
/// Paths are relative to the root. `dst` and `hash` are omitted from the
/// wire format when absent; `ok` always appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub ok: bool,
}

impl JournalEntry {
    /// New intent entry (`ok=false`, timestamp left for the writer)
    pub fn intent(kind: EntryKind, src: impl Into<String>) -> Self {
        Self {
            ts: DateTime::<Utc>::UNIX_EPOCH,
            kind,
            src: src.into(),
            dst: None,
            hash: None,
            ok: false,
        }
    }

    pub fn with_dst(mut self, dst: impl Into<String>) -> Self {
        self.dst = Some(dst.into());
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// The confirmation twin of this entry
    pub fn confirmed(&self) -> Self {
        let mut entry = self.clone();
        entry.ts = DateTime::<Utc>::UNIX_EPOCH;
        entry.ok = true;
        entry
    }
}

/// Append-only journal writer with per-line fsync
///
/// Safe to share across threads; an internal mutex serializes writers.
pub struct JournalWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl JournalWriter {
    /// Create a fresh journal; the file must not already exist
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and fsync before returning
    ///
    /// An epoch timestamp is replaced with current UTC.
    pub fn log(&self, entry: JournalEntry) -> Result<()> {
        let mut entry = entry;
        if entry.ts == DateTime::<Utc>::UNIX_EPOCH {
            entry.ts = Utc::now();
        }
        let line = serde_json::to_string(&entry)?;

        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::IoError("journal writer mutex poisoned".to_string()))?;
        writeln!(file, "{}", line).map_err(|e| Error::io(&self.path, e))?;
        file.sync_all().map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }

}

/// Journal handle scoped to one run
///
/// Executors log through this around each individual mutation: the
/// intent line lands (fsynced) before the filesystem op, the
/// confirmation (fsynced) after it succeeds, so a crash at any point
/// loses at most the in-flight mutation and every completed one stays
/// replayable. Absolute paths are resolved to root-relative form here;
/// writes are counted so an untouched journal can be discarded instead
/// of left for undo to trip over.
pub struct RunJournal {
    writer: JournalWriter,
    safe: SafePath,
    logged: AtomicU64,
}

impl RunJournal {
    /// Open a fresh journal for one run
    pub fn create(safe: &SafePath, path: &Path) -> Result<Self> {
        Ok(Self {
            writer: JournalWriter::create(path)?,
            safe: safe.clone(),
            logged: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Write and fsync the intent line for a mutation about to happen
    ///
    /// Returns the entry so the caller can confirm it once the
    /// filesystem op succeeds. A mutation that fails in between leaves
    /// the intent unconfirmed, which `validate` reports as a partial
    /// write.
    pub fn log_intent(
        &self,
        kind: EntryKind,
        src: &Path,
        dst: Option<&Path>,
        hash: Option<&str>,
    ) -> Result<JournalEntry> {
        let mut entry = JournalEntry::intent(kind, self.rel(src)?);
        if let Some(dst) = dst {
            entry = entry.with_dst(self.rel(dst)?);
        }
        if let Some(hash) = hash {
            entry = entry.with_hash(hash);
        }
        self.writer.log(entry.clone())?;
        self.logged.fetch_add(1, Ordering::Relaxed);
        Ok(entry)
    }

    /// Write and fsync the confirmation twin of `intent`
    pub fn log_confirmation(&self, intent: &JournalEntry) -> Result<()> {
        self.writer.log(intent.confirmed())?;
        self.logged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Close the journal; an empty one is removed, since it records
    /// nothing for undo to replay.
    pub fn finish(self) -> Result<Option<PathBuf>> {
        let path = self.writer.path().to_path_buf();
        let logged = self.logged.load(Ordering::Relaxed);
        drop(self.writer);

        if logged == 0 {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            return Ok(None);
        }
        Ok(Some(path))
    }

    fn rel(&self, p: &Path) -> Result<String> {
        Ok(self.safe.rel_of(p)?.to_string_lossy().into_owned())
    }
}

/// Read all entries of a journal, forward
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        if line.is_empty() {
            continue;
        }
        let entry: JournalEntry = serde_json::from_str(&line).map_err(|e| {
            Error::ParseError(format!(
                "{} line {}: {}",
                path.display(),
                line_num + 1,
                e
            ))
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Read all entries of a journal, newest first
///
/// The driver for undo's reverse replay.
pub fn read_entries_reversed(path: &Path) -> Result<Vec<JournalEntry>> {
    let mut entries = read_entries(path)?;
    entries.reverse();
    Ok(entries)
}

/// Check the intent/confirmation pairing of a journal
///
/// Returns `PartialWrite` naming the first intent that has no later
/// confirmation with identical `(type, src)`.
pub fn validate(path: &Path) -> Result<()> {
    validate_entries(&read_entries(path)?)
}

/// Pairing check over already-read entries
pub fn validate_entries(entries: &[JournalEntry]) -> Result<()> {
    for (i, entry) in entries.iter().enumerate() {
        if entry.ok {
            continue;
        }
        let confirmed = entries[i + 1..]
            .iter()
            .any(|later| later.ok && later.kind == entry.kind && later.src == entry.src);
        if !confirmed {
            return Err(Error::PartialWrite(format!(
                "type={:?} src={}",
                entry.kind, entry.src
            )));
        }
    }
    Ok(())
}

/// List active (not rolled-back) journals in a journal directory, sorted
/// by file name
///
/// Run ids embed the wall-clock second, so name order is creation order.
pub fn list_active(journal_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut journals = Vec::new();

    if !journal_dir.exists() {
        return Ok(journals);
    }

    for entry in fs::read_dir(journal_dir).map_err(|e| Error::io(journal_dir, e))? {
        let entry = entry.map_err(|e| Error::io(journal_dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && name.ends_with(".jsonl") && !name.ends_with(ROLLED_BACK_SUFFIX) {
            journals.push(path);
        }
    }

    journals.sort();
    Ok(journals)
}

/// Rename a journal to its rolled-back form; returns the new path
pub fn mark_rolled_back(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".jsonl"))
        .ok_or_else(|| Error::InvalidPath(format!("not a journal: {}", path.display())))?;

    let target = path.with_file_name(format!("{}{}", name, ROLLED_BACK_SUFFIX));
    fs::rename(path, &target).map_err(|e| Error::io(path, e))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(kind: EntryKind, src: &str) -> JournalEntry {
        JournalEntry::intent(kind, src)
    }

    /// Intent line, then its confirmation, the way executors write them
    /// around a mutation.
    fn log_mutation(writer: &JournalWriter, intent: JournalEntry) {
        writer.log(intent.clone()).unwrap();
        writer.log(intent.confirmed()).unwrap();
    }

    #[test]
    fn test_intent_then_confirmation_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let writer = JournalWriter::create(&path).unwrap();

        log_mutation(
            &writer,
            entry(EntryKind::Rename, "a.txt").with_dst("2024-07-02_a.txt"),
        );

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].ok);
        assert!(entries[1].ok);
        assert_eq!(entries[0].kind, entries[1].kind);
        assert_eq!(entries[0].src, entries[1].src);
        assert_eq!(entries[0].dst, entries[1].dst);
        assert_ne!(entries[0].ts, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let _writer = JournalWriter::create(&path).unwrap();
        assert!(JournalWriter::create(&path).is_err());
    }

    #[test]
    fn test_wire_format_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let writer = JournalWriter::create(&path).unwrap();
        writer
            .log(entry(EntryKind::Trash, "dir2/file.txt").with_dst(".btidy/trash/x/dir2/file.txt"))
            .unwrap();
        writer.log(entry(EntryKind::Mkdir, "newdir")).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"trash\""));
        assert!(lines[0].contains("\"ok\":false"));
        assert!(lines[0].contains("\"dst\""));
        // Absent optionals are omitted entirely.
        assert!(!lines[1].contains("\"dst\""));
        assert!(!lines[1].contains("\"hash\""));
    }

    #[test]
    fn test_validate_detects_partial_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let writer = JournalWriter::create(&path).unwrap();

        log_mutation(&writer, entry(EntryKind::Rename, "a.txt"));
        // Intent without confirmation: the crash window.
        writer.log(entry(EntryKind::Trash, "b.txt")).unwrap();

        match validate(&path) {
            Err(Error::PartialWrite(msg)) => assert!(msg.contains("b.txt")),
            other => panic!("expected PartialWrite, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_accepts_complete_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let writer = JournalWriter::create(&path).unwrap();
        log_mutation(&writer, entry(EntryKind::Rename, "a.txt"));
        log_mutation(
            &writer,
            entry(EntryKind::Trash, "b.txt").with_hash("ab".repeat(32)),
        );
        validate(&path).unwrap();
    }

    #[test]
    fn test_reverse_read_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        let writer = JournalWriter::create(&path).unwrap();
        log_mutation(&writer, entry(EntryKind::Rename, "first.txt"));
        log_mutation(&writer, entry(EntryKind::Rename, "second.txt"));

        let reversed = read_entries_reversed(&path).unwrap();
        assert_eq!(reversed[0].src, "second.txt");
        assert!(reversed[0].ok);
        assert_eq!(reversed[3].src, "first.txt");
        assert!(!reversed[3].ok);
    }

    #[test]
    fn test_list_active_skips_rolled_back() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("rename-20240702-100000-aaaaaa.jsonl");
        let b = dir.path().join("flatten-20240701-090000-bbbbbb.rolled-back.jsonl");
        fs::write(&a, b"").unwrap();
        fs::write(&b, b"").unwrap();

        let active = list_active(dir.path()).unwrap();
        assert_eq!(active, vec![a]);
    }

    #[test]
    fn test_mark_rolled_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rename-20240702-100000-aaaaaa.jsonl");
        fs::write(&path, b"").unwrap();

        let target = mark_rolled_back(&path).unwrap();
        assert!(!path.exists());
        assert!(target.exists());
        assert!(
            target
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .ends_with(ROLLED_BACK_SUFFIX)
        );
    }

    #[test]
    fn test_run_journal_relativizes_and_pairs() {
        let dir = TempDir::new().unwrap();
        let safe = SafePath::new(dir.path()).unwrap();
        let path = dir.path().join("run.jsonl");
        let journal = RunJournal::create(&safe, &path).unwrap();

        let intent = journal
            .log_intent(
                EntryKind::Rename,
                &dir.path().join("docs/a.txt"),
                Some(&dir.path().join("docs/b.txt")),
                None,
            )
            .unwrap();
        journal.log_confirmation(&intent).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].src, "docs/a.txt");
        assert_eq!(entries[0].dst.as_deref(), Some("docs/b.txt"));
        assert!(!entries[0].ok);
        assert!(entries[1].ok);

        assert_eq!(journal.finish().unwrap(), Some(path.clone()));
        assert!(path.exists());
    }

    #[test]
    fn test_run_journal_unconfirmed_intent_is_partial() {
        let dir = TempDir::new().unwrap();
        let safe = SafePath::new(dir.path()).unwrap();
        let path = dir.path().join("run.jsonl");
        let journal = RunJournal::create(&safe, &path).unwrap();

        // Intent logged, then the mutation fails before confirmation.
        journal
            .log_intent(EntryKind::Trash, &dir.path().join("gone.txt"), None, None)
            .unwrap();
        journal.finish().unwrap();

        assert!(matches!(validate(&path), Err(Error::PartialWrite(_))));
    }

    #[test]
    fn test_run_journal_discards_empty_file() {
        let dir = TempDir::new().unwrap();
        let safe = SafePath::new(dir.path()).unwrap();
        let path = dir.path().join("run.jsonl");
        let journal = RunJournal::create(&safe, &path).unwrap();

        assert!(path.exists());
        assert_eq!(journal.finish().unwrap(), None);
        assert!(!path.exists());
    }
}
