//! Watermark behaviour across successive runs

use std::sync::Arc;

use articlemeta_dump::downloader::SilentProgress;
use articlemeta_dump::dumper::Dumper;
use articlemeta_dump::resume::WatermarkTracker;
use articlemeta_dump::shutdown::ShutdownCoordinator;
use tempfile::TempDir;

use crate::common::{article, MockCatalog};

#[tokio::test]
async fn test_watermark_advances_and_next_run_starts_from_it() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(MockCatalog::new().with_document(
        "colA",
        "pid001",
        "2024-01-10",
        &article("pid001", "2024-01-10"),
    ));
    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());
    let watermark = WatermarkTracker::new(dumper.layout().collection("colA").watermark_path());

    let first = dumper.run_collection("colA", &SilentProgress).await.unwrap();
    assert_eq!(first.watermark.as_deref(), Some("2024-01-10"));
    assert_eq!(watermark.read().unwrap(), "2024-01-10");

    catalog.add_document("colA", "pid002", "2024-02-20", &article("pid002", "2024-02-20"));
    let second = dumper.run_collection("colA", &SilentProgress).await.unwrap();
    assert_eq!(second.from_date, "2024-01-10");
    assert_eq!(second.downloads.written, 1);
    // pid001 is listed again on the watermark date, its stored copy is current
    assert_eq!(second.downloads.skipped_existing, 1);
    assert_eq!(catalog.fetch_calls(), 2);
    assert_eq!(watermark.read().unwrap(), "2024-02-20");

    dumper.run_collection("colA", &SilentProgress).await.unwrap();

    let requests = catalog.identifier_requests();
    assert_eq!(
        requests,
        vec![
            ("colA".to_string(), "1900-01-01".to_string()),
            ("colA".to_string(), "2024-01-10".to_string()),
            ("colA".to_string(), "2024-02-20".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(MockCatalog::new().with_document("colA", "pid001", "2024-01-10", b"{}"));
    let dumper = Dumper::new(catalog, workdir.path(), ShutdownCoordinator::shared());
    let watermark = WatermarkTracker::new(dumper.layout().collection("colA").watermark_path());
    std::fs::create_dir_all(dumper.layout().collection("colA").root()).unwrap();
    watermark.write("2024-03-01").unwrap();

    let summary = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    // nothing processed since the watermark
    assert_eq!(summary.identifiers, 0);
    assert_eq!(summary.watermark, None);
    assert_eq!(watermark.read().unwrap(), "2024-03-01");
}

#[tokio::test]
async fn test_empty_collection_keeps_epoch() {
    let workdir = TempDir::new().unwrap();
    let dumper = Dumper::new(Arc::new(MockCatalog::new()), workdir.path(), ShutdownCoordinator::shared());

    let summary = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(summary.identifiers, 0);
    assert_eq!(summary.downloads.total, 0);
    let list = std::fs::read_to_string(&summary.identifier_list).unwrap();
    assert!(list.is_empty());
    assert!(!workdir.path().join("json/colA/lastdate.txt").exists());
}

#[tokio::test]
async fn test_reprocessed_document_is_fetched_again() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(MockCatalog::new().with_document(
        "colA",
        "pid001",
        "2024-01-10",
        br#"{"code":"pid001","processing_date":"2024-01-10","v":1}"#,
    ));
    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());
    let stored = dumper.layout().collection("colA").data_dir().join("pid001.json");

    dumper.run_collection("colA", &SilentProgress).await.unwrap();

    catalog.add_document(
        "colA",
        "pid001",
        "2024-02-20",
        br#"{"code":"pid001","processing_date":"2024-02-20","v":2}"#,
    );
    let second = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(second.identifiers, 1);
    assert_eq!(second.downloads.written, 1);
    assert_eq!(second.downloads.skipped_existing, 0);
    assert_eq!(second.watermark.as_deref(), Some("2024-02-20"));
    assert_eq!(
        std::fs::read(&stored).unwrap(),
        br#"{"code":"pid001","processing_date":"2024-02-20","v":2}"#
    );
}

#[tokio::test]
async fn test_unchanged_document_on_watermark_date_is_not_fetched() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(MockCatalog::new().with_document(
        "colA",
        "pid001",
        "2024-01-10",
        &article("pid001", "2024-01-10"),
    ));
    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());

    dumper.run_collection("colA", &SilentProgress).await.unwrap();
    let second = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(second.from_date, "2024-01-10");
    assert_eq!(second.downloads.skipped_existing, 1);
    assert_eq!(catalog.fetch_calls(), 1);
}
