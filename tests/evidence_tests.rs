use airlink_audit::{CoreCheck, EvidenceCategory, EvidenceIndexer};
use std::fs;
use std::path::Path;

fn write(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_index_maps_files_to_core_checks() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "logs/discovery_scan.log", b"found 3 peers");
    write(dir.path(), "screenshots/qr_pairing_success.png", &[0x89, 0x50, 0x4e, 0x47]);

    let index = EvidenceIndexer::new(dir.path()).index();
    assert!(index.errors.is_empty());
    assert_eq!(index.len(), 2);
    assert_eq!(index.total_size(), 13 + 4);

    let log = &index.items[0];
    assert_eq!(log.relative_path, "logs/discovery_scan.log");
    assert_eq!(log.filename, "discovery_scan.log");
    assert_eq!(log.category, EvidenceCategory::Log);
    assert_eq!(log.core_check.map(|c| c.number()), Some(1));

    let screenshot = &index.items[1];
    assert_eq!(screenshot.category, EvidenceCategory::Screenshot);
    assert_eq!(screenshot.core_check.map(|c| c.number()), Some(8));
    assert!(screenshot.modified.is_some());
}

#[test]
fn test_index_groups_by_check_and_category() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "checksums/transfer_10mb.sha256", b"abc");
    write(dir.path(), "data/performance_run.json", b"{}");
    write(dir.path(), "videos/multi_receiver_demo.mp4", b"");
    write(dir.path(), "notes/readme.md", b"general");

    let index = EvidenceIndexer::new(dir.path()).index();
    assert_eq!(index.len(), 4);

    let by_check = index.by_core_check();
    assert_eq!(by_check[&CoreCheck::ChecksumVerification].len(), 1);
    assert_eq!(by_check[&CoreCheck::Performance].len(), 1);
    assert_eq!(index.for_check(CoreCheck::MultiReceiver).len(), 1);
    assert!(index.for_check(CoreCheck::QrPairing).is_empty());

    let categories = index.count_by_category();
    assert_eq!(categories[&EvidenceCategory::Checksum], 1);
    assert_eq!(categories[&EvidenceCategory::Data], 1);
    assert_eq!(categories[&EvidenceCategory::Video], 1);
    assert_eq!(categories[&EvidenceCategory::Other], 1);
}

#[test]
fn test_missing_root_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let index = EvidenceIndexer::new(dir.path().join("absent")).index();

    assert!(index.is_empty());
    assert_eq!(index.errors.len(), 1);
    assert!(index.errors[0].contains("not found"));
}

#[test]
fn test_classification_uses_relative_path_only() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("discovery_run");
    write(&root, "misc/capture.bin", b"x");

    let index = EvidenceIndexer::new(&root).index();
    assert_eq!(index.len(), 1);
    assert_eq!(index.items[0].core_check, None);
}
