// tests/workflow.rs

//! End-to-end workflow tests: every command through the full pipeline
//! (lock, walk, snapshot, execute, journal), plus the invariants the
//! engine guarantees across them.

mod common;

use btidy::workflow::{self, journal};
use btidy::{Error, HashConfig, Manifest, Request, RootLock, SafePath, WorkflowOptions};
use common::{
    active_journals, root_file_names, set_mtime, setup_root, test_options, trash_run_dirs,
    write_file,
};
use std::fs;

#[test]
fn test_rename_canonicalizes_and_undo_round_trips() {
    // Scenario: a single messy file name, renamed then fully undone.
    let root = setup_root();
    let original = write_file(root.path(), "My Document.pdf", b"pdf bytes");
    set_mtime(&original, "2024-07-02T10:00:00Z");

    let outcome = workflow::execute(root.path(), Request::Rename, &test_options()).unwrap();
    assert_eq!(outcome.counts.ok, 1);
    assert_eq!(outcome.counts.errors, 0);

    let renamed = root.path().join("2024-07-02_my_document.pdf");
    assert!(renamed.exists());
    assert!(!original.exists());

    let report = btidy::workflow::undo::undo(root.path(), &Default::default()).unwrap();
    assert_eq!(report.reversed, 1);
    assert_eq!(report.errors, 0);
    assert!(original.exists());
    assert!(!renamed.exists());

    // The journal is renamed so it cannot be applied twice.
    let rolled_back = report.rolled_back_path.unwrap();
    assert!(rolled_back
        .to_string_lossy()
        .ends_with(".rolled-back.jsonl"));
    assert!(rolled_back.exists());
    assert!(active_journals(root.path()).is_empty());
}

#[test]
fn test_double_undo_finds_no_journal() {
    let root = setup_root();
    write_file(root.path(), "Messy Name.txt", b"x");

    workflow::execute(root.path(), Request::Rename, &test_options()).unwrap();
    btidy::workflow::undo::undo(root.path(), &Default::default()).unwrap();

    match btidy::workflow::undo::undo(root.path(), &Default::default()) {
        Err(Error::NoActiveJournals(_)) => {}
        other => panic!("expected NoActiveJournals, got {:?}", other.map(|r| r.restored)),
    }
}

#[test]
fn test_flatten_trashes_content_duplicate() {
    // Same name, same bytes: the second copy is a duplicate.
    let root = setup_root();
    write_file(root.path(), "dir1/file.txt", b"same");
    write_file(root.path(), "dir2/file.txt", b"same");

    let outcome = workflow::execute(root.path(), Request::Flatten, &test_options()).unwrap();
    assert_eq!(outcome.counts.errors, 0);

    assert_eq!(root_file_names(root.path()), vec!["file.txt"]);
    assert_eq!(fs::read(root.path().join("file.txt")).unwrap(), b"same");

    let trash = root
        .path()
        .join(".btidy/trash")
        .join(outcome.run_id.as_str())
        .join("dir2/file.txt");
    assert!(trash.exists());
    assert_eq!(fs::read(&trash).unwrap(), b"same");
}

#[test]
fn test_flatten_suffixes_name_collision() {
    // Same name, different bytes: both survive at the root.
    let root = setup_root();
    write_file(root.path(), "dir1/file.txt", b"A");
    write_file(root.path(), "dir2/file.txt", b"B");

    workflow::execute(root.path(), Request::Flatten, &test_options()).unwrap();

    assert_eq!(
        root_file_names(root.path()),
        vec!["file.txt", "file_1.txt"]
    );
    assert_eq!(fs::read(root.path().join("file.txt")).unwrap(), b"A");
    assert_eq!(fs::read(root.path().join("file_1.txt")).unwrap(), b"B");
}

#[test]
fn test_flatten_prunes_emptied_directories() {
    let root = setup_root();
    write_file(root.path(), "a/b/c/deep.txt", b"x");

    workflow::execute(root.path(), Request::Flatten, &test_options()).unwrap();

    assert!(root.path().join("deep.txt").exists());
    assert!(!root.path().join("a").exists());
}

#[test]
fn test_organize_groups_by_extension() {
    let root = setup_root();
    write_file(root.path(), "report.PDF", b"1");
    write_file(root.path(), "slides.pdf", b"2");
    write_file(root.path(), "notes.txt", b"3");
    write_file(root.path(), "README", b"4");

    let outcome = workflow::execute(root.path(), Request::Organize, &test_options()).unwrap();
    assert_eq!(outcome.counts.ok, 4);

    assert!(root.path().join("pdf/report.PDF").exists());
    assert!(root.path().join("pdf/slides.pdf").exists());
    assert!(root.path().join("txt/notes.txt").exists());
    assert!(root.path().join("no_ext/README").exists());
}

#[test]
fn test_duplicate_keeps_first_path_and_trashes_rest() {
    let root = setup_root();
    write_file(root.path(), "a.bin", b"identical content");
    write_file(root.path(), "b.bin", b"identical content");
    write_file(root.path(), "c.bin", b"different content!");

    let outcome = workflow::execute(root.path(), Request::Duplicate, &test_options()).unwrap();
    assert_eq!(outcome.counts.ok, 1);

    assert!(root.path().join("a.bin").exists());
    assert!(!root.path().join("b.bin").exists());
    assert!(root.path().join("c.bin").exists());

    // The trashed duplicate's hash travels in the journal for undo.
    let journals = active_journals(root.path());
    assert_eq!(journals.len(), 1);
    let entries = journal::read_entries(&journals[0]).unwrap();
    assert!(entries.iter().all(|e| e.hash.as_deref().is_some_and(|h| h.len() == 64)));
}

#[test]
fn test_unzip_refuses_escaping_entry_but_extracts_siblings() {
    // Zip-slip: one malicious entry must not poison the archive.
    let root = setup_root();
    let archive_path = root.path().join("sub/evil.zip");
    fs::create_dir_all(archive_path.parent().unwrap()).unwrap();

    let file = fs::File::create(&archive_path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("../escape.txt", options).unwrap();
    std::io::Write::write_all(&mut zip, b"evil").unwrap();
    zip.start_file("ok.txt", options).unwrap();
    std::io::Write::write_all(&mut zip, b"fine").unwrap();
    zip.finish().unwrap();

    let outcome = workflow::execute(root.path(), Request::Unzip, &test_options()).unwrap();

    let skipped: Vec<&str> = outcome
        .operations
        .iter()
        .filter_map(|op| match &op.status {
            btidy::OpStatus::Skipped(reason) => Some(reason.as_str()),
            _ => None,
        })
        .collect();
    assert!(skipped.iter().any(|r| r.contains("escape")));

    // The sibling still extracted; nothing landed outside the dest dir.
    assert_eq!(
        fs::read(root.path().join("sub/evil/ok.txt")).unwrap(),
        b"fine"
    );
    assert!(!root.path().join("sub/escape.txt").exists());
    assert!(!root.path().join("escape.txt").exists());

    // The archive went to trash.
    assert!(!archive_path.exists());
    let trash = trash_run_dirs(root.path());
    assert_eq!(trash.len(), 1);
    assert!(trash[0].join("sub/evil.zip").exists());
}

#[test]
fn test_unzip_undo_restores_archive_and_keeps_extracted_files() {
    let root = setup_root();
    let archive_path = root.path().join("photos.zip");
    let file = fs::File::create(&archive_path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("one.txt", options).unwrap();
    std::io::Write::write_all(&mut zip, b"1").unwrap();
    zip.finish().unwrap();

    workflow::execute(root.path(), Request::Unzip, &test_options()).unwrap();
    assert!(!archive_path.exists());
    assert!(root.path().join("photos/one.txt").exists());

    let report = btidy::workflow::undo::undo(root.path(), &Default::default()).unwrap();
    assert_eq!(report.restored, 1);

    // Archive is back; extracted files are left in place (their journal
    // entries are skips, not reversals).
    assert!(archive_path.exists());
    assert!(root.path().join("photos/one.txt").exists());
    assert!(report.skipped >= 1);
}

#[test]
fn test_journal_pairs_intent_and_confirmation() {
    let root = setup_root();
    write_file(root.path(), "Messy One.txt", b"1");
    write_file(root.path(), "Messy Two.txt", b"2");

    workflow::execute(root.path(), Request::Rename, &test_options()).unwrap();

    let journals = active_journals(root.path());
    assert_eq!(journals.len(), 1);
    let entries = journal::read_entries(&journals[0]).unwrap();
    assert_eq!(entries.len(), 4);

    for pair in entries.chunks(2) {
        assert!(!pair[0].ok);
        assert!(pair[1].ok);
        assert_eq!(pair[0].kind, pair[1].kind);
        assert_eq!(pair[0].src, pair[1].src);
        assert_eq!(pair[0].dst, pair[1].dst);
    }
    journal::validate(&journals[0]).unwrap();
}

#[test]
fn test_executors_are_idempotent() {
    let root = setup_root();
    write_file(root.path(), "Messy Name.pdf", b"a");
    write_file(root.path(), "dir/nested.txt", b"b");
    write_file(root.path(), "copy1.bin", b"dup");
    write_file(root.path(), "copy2.bin", b"dup");

    for request in [Request::Rename, Request::Flatten, Request::Duplicate] {
        let first = workflow::execute(root.path(), request, &test_options()).unwrap();
        assert!(first.counts.errors == 0);
        let second = workflow::execute(root.path(), request, &test_options()).unwrap();
        assert_eq!(
            second.counts.ok, 0,
            "{:?} second run must be a no-op",
            request
        );
        assert!(second.journal_path.is_none());
    }
}

#[test]
fn test_unique_hashes_survive_reversible_pipeline() {
    let root = setup_root();
    write_file(root.path(), "One File.txt", b"alpha");
    write_file(root.path(), "deep/Other File.txt", b"beta");
    write_file(root.path(), "deep/copy.txt", b"alpha");

    let before = {
        let safe = SafePath::new(root.path()).unwrap();
        let files = btidy::collect_files(root.path()).unwrap();
        Manifest::generate(&safe, &files, HashConfig::with_workers(1)).unwrap()
    };

    for request in [
        Request::Rename,
        Request::Flatten,
        Request::Organize,
        Request::Duplicate,
    ] {
        workflow::execute(root.path(), request, &test_options()).unwrap();
    }

    let after = {
        let safe = SafePath::new(root.path()).unwrap();
        let files = btidy::collect_files(root.path()).unwrap();
        Manifest::generate(&safe, &files, HashConfig::with_workers(1)).unwrap()
    };

    let before_hashes: std::collections::HashSet<String> = before
        .unique_hashes()
        .into_iter()
        .map(str::to_string)
        .collect();
    let after_hashes: std::collections::HashSet<String> = after
        .unique_hashes()
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(before_hashes, after_hashes);
}

#[test]
fn test_snapshot_written_before_mutation() {
    let root = setup_root();
    write_file(root.path(), "Messy.txt", b"snapshot me");

    let outcome = workflow::execute(root.path(), Request::Rename, &test_options()).unwrap();

    let snapshot = outcome.snapshot_path.unwrap();
    let manifest = Manifest::load(&snapshot).unwrap();
    assert_eq!(manifest.version, 1);
    assert_eq!(manifest.entries.len(), 1);
    // The snapshot captured the pre-mutation name.
    assert_eq!(manifest.entries[0].path, "Messy.txt");
}

#[test]
fn test_no_snapshot_option() {
    let root = setup_root();
    write_file(root.path(), "Messy.txt", b"x");

    let options = WorkflowOptions {
        snapshot: false,
        ..test_options()
    };
    let outcome = workflow::execute(root.path(), Request::Rename, &options).unwrap();
    assert!(outcome.snapshot_path.is_none());
}

#[test]
fn test_dry_run_touches_nothing() {
    let root = setup_root();
    write_file(root.path(), "Messy Name.txt", b"x");
    write_file(root.path(), "dir/another.txt", b"y");

    let options = WorkflowOptions {
        dry_run: true,
        ..test_options()
    };
    for request in [Request::Rename, Request::Flatten, Request::Duplicate] {
        let outcome = workflow::execute(root.path(), request, &options).unwrap();
        assert!(outcome.journal_path.is_none());
        assert!(outcome.snapshot_path.is_none());
    }

    assert!(root.path().join("Messy Name.txt").exists());
    assert!(root.path().join("dir/another.txt").exists());
    assert!(trash_run_dirs(root.path()).is_empty());
    assert!(active_journals(root.path()).is_empty());
}

#[test]
fn test_lock_exclusivity() {
    let root = setup_root();
    write_file(root.path(), "file.txt", b"x");

    let meta = btidy::MetaDir::init(root.path()).unwrap();
    let _held = RootLock::acquire(&meta.lock_path()).unwrap();

    match workflow::execute(root.path(), Request::Rename, &test_options()) {
        Err(Error::LockContended(_)) => {}
        other => panic!("expected LockContended, got {:?}", other.map(|o| o.counts)),
    }
    // The held lock kept the workflow out before any mutation.
    assert!(root.path().join("file.txt").exists());
}

#[test]
fn test_empty_root_is_success_with_zero_counts() {
    let root = setup_root();
    let outcome = workflow::execute(root.path(), Request::Flatten, &test_options()).unwrap();
    assert_eq!(outcome.files_considered, 0);
    assert_eq!(outcome.counts, btidy::OpCounts::default());
    assert!(outcome.journal_path.is_none());
}
