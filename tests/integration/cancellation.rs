//! Cooperative cancellation of the download pipeline

use std::sync::Arc;
use std::time::Duration;

use articlemeta_dump::downloader::{DownloadError, DownloadExecutor, FetchOptions, FetchTask, SilentProgress};
use articlemeta_dump::dumper::{DumpError, Dumper};
use articlemeta_dump::shutdown::ShutdownCoordinator;
use articlemeta_dump::{DocumentFormat, DocumentId};
use tempfile::TempDir;

use crate::common::{CancelAfter, MockCatalog};

fn ten_documents() -> MockCatalog {
    let mut catalog = MockCatalog::new().with_delay(Duration::from_millis(20));
    for i in 0..10 {
        catalog = catalog.with_document("colA", &format!("pid{i:02}"), &format!("2024-01-{:02}", i + 1), b"{}");
    }
    catalog
}

#[tokio::test]
async fn test_cancel_after_third_completion() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(ten_documents());
    let shutdown = ShutdownCoordinator::shared();
    let progress = CancelAfter::new(3, shutdown.clone());

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let id = DocumentId::new("colA", format!("pid{i:02}")).unwrap();
            let dest = workdir.path().join(format!("{}.json", id.pid()));
            FetchTask::new(id, dest, DocumentFormat::json(), FetchOptions::default())
        })
        .collect();

    let executor = DownloadExecutor::new(catalog.clone(), shutdown.clone()).with_concurrency(2);
    let result = executor.execute(tasks, &progress).await;

    assert!(matches!(result, Err(DownloadError::Cancelled)));
    // three completions plus at most the two that were in flight
    assert!(catalog.fetch_calls() <= 5, "fetch calls: {}", catalog.fetch_calls());
    assert!(catalog.fetch_calls() >= 3);

    // files written before the cancellation are intact
    let stored = std::fs::read_dir(workdir.path()).unwrap().count();
    assert!((3..=5).contains(&stored), "stored: {stored}");
}

#[tokio::test]
async fn test_cancelled_run_keeps_watermark() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(ten_documents());
    let shutdown = ShutdownCoordinator::shared();
    let progress = CancelAfter::new(3, shutdown.clone());
    let dumper = Dumper::new(catalog.clone(), workdir.path(), shutdown.clone()).with_concurrency(2);

    let result = dumper.run_collection("colA", &progress).await;

    assert!(matches!(result, Err(DumpError::Cancelled)));
    assert!(catalog.fetch_calls() <= 5);
    assert!(!workdir.path().join("json/colA/lastdate.txt").exists());
}

#[tokio::test]
async fn test_poisoned_before_start_does_no_io() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(ten_documents());
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let id = DocumentId::new("colA", "pid00").unwrap();
    let task = FetchTask::new(id, workdir.path().join("pid00.json"), DocumentFormat::json(), FetchOptions::default());
    let result = DownloadExecutor::new(catalog.clone(), shutdown)
        .execute(vec![task], &SilentProgress)
        .await;

    assert!(matches!(result, Err(DownloadError::Cancelled)));
    assert_eq!(catalog.fetch_calls(), 0);
    assert_eq!(std::fs::read_dir(workdir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_collection_sequence() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(
        ten_documents()
            .with_collection("colA", "certified", true)
            .with_collection("colB", "certified", true)
            .with_document("colB", "b1", "2024-01-01", b"{}"),
    );
    let shutdown = ShutdownCoordinator::shared();
    let progress = CancelAfter::new(1, shutdown.clone());
    let dumper = Dumper::new(catalog.clone(), workdir.path(), shutdown);

    let result = dumper.run(None, &progress).await;

    assert!(matches!(result, Err(DumpError::Cancelled)));
    let requested: Vec<_> = catalog.identifier_requests().into_iter().map(|(c, _)| c).collect();
    assert_eq!(requested, vec!["colA".to_string()]);
}
