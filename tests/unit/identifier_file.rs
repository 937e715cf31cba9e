//! Identifier list files: writing, reading and downloading

use std::sync::Arc;

use articlemeta_dump::downloader::SilentProgress;
use articlemeta_dump::dumper::{DumpError, Dumper};
use articlemeta_dump::identifier::{read_identifier_file, IdentifierError};
use articlemeta_dump::shutdown::ShutdownCoordinator;
use tempfile::TempDir;

use crate::common::MockCatalog;

fn catalog() -> MockCatalog {
    MockCatalog::new()
        .with_collection("colA", "certified", true)
        .with_collection("colB", "diffusion", true)
        .with_document("colA", "a1", "2024-01-01", b"{}")
        .with_document("colA", "a2", "2024-03-01", b"{}")
        .with_document("colB", "b1", "2024-02-01", b"{}")
}

#[tokio::test]
async fn test_write_identifier_list_for_all_eligible_collections() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("lists/new_pids.txt");
    let dumper = Dumper::new(Arc::new(catalog()), dir.path(), ShutdownCoordinator::shared());

    let count = dumper.write_identifier_list("2024-02-01", None, &output).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "colA a2\ncolB b1\n");
}

#[tokio::test]
async fn test_download_identifier_file_into_layout() {
    let dir = TempDir::new().unwrap();
    let pids = dir.path().join("pids.txt");
    std::fs::write(&pids, "colA a1\n\ncolB b1\ncolB missing\n").unwrap();
    let dumper = Dumper::new(Arc::new(catalog()), dir.path(), ShutdownCoordinator::shared());

    let summary = dumper.download_identifier_file(&pids, &SilentProgress).await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.written, 2);
    assert_eq!(summary.skipped_null, 1);
    assert!(dir.path().join("json/colA/data/a1.json").exists());
    assert!(dir.path().join("json/colB/data/b1.json").exists());
    // identifier files never touch the watermark
    assert!(!dir.path().join("json/colA/lastdate.txt").exists());
}

#[tokio::test]
async fn test_malformed_identifier_file_names_the_line() {
    let dir = TempDir::new().unwrap();
    let pids = dir.path().join("pids.txt");
    std::fs::write(&pids, "colA a1\n\nonly-one-field\n").unwrap();

    match read_identifier_file(&pids) {
        Err(IdentifierError::InvalidLine { line, .. }) => assert_eq!(line, 3),
        other => panic!("unexpected result: {other:?}"),
    }

    let dumper = Dumper::new(Arc::new(catalog()), dir.path(), ShutdownCoordinator::shared());
    let result = dumper.download_identifier_file(&pids, &SilentProgress).await;
    assert!(matches!(result, Err(DumpError::Identifier(_))));
}
