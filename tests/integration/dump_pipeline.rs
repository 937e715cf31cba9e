//! End-to-end collection runs against an in-memory catalog

use std::sync::Arc;
use std::time::Duration;

use articlemeta_dump::downloader::{DownloadExecutor, FetchOptions, FetchTask, SilentProgress};
use articlemeta_dump::dumper::Dumper;
use articlemeta_dump::shutdown::ShutdownCoordinator;
use articlemeta_dump::{DocumentFormat, DocumentId};
use tempfile::TempDir;

use crate::common::{article, MockCatalog};

fn two_document_catalog() -> MockCatalog {
    MockCatalog::new()
        .with_collection("colA", "certified", true)
        .with_document("colA", "pid001", "2024-01-01", br#"{"title":"x"}"#)
        .with_document("colA", "pid002", "2024-01-02", b"null")
}

#[tokio::test]
async fn test_two_documents_one_null() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(two_document_catalog());
    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());

    let summary = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    let data = workdir.path().join("json/colA/data");
    assert_eq!(std::fs::read(data.join("pid001.json")).unwrap(), br#"{"title":"x"}"#);
    assert!(!data.join("pid002.json").exists());
    assert_eq!(std::fs::read_dir(&data).unwrap().count(), 1);

    assert_eq!(summary.identifiers, 2);
    assert_eq!(summary.downloads.written, 1);
    assert_eq!(summary.downloads.skipped_null, 1);
    assert_eq!(summary.from_date, "1900-01-01");
    assert_eq!(summary.watermark.as_deref(), Some("2024-01-02"));

    let list = std::fs::read_to_string(&summary.identifier_list).unwrap();
    assert_eq!(list, "colA pid001\ncolA pid002\n");
    let file_name = summary.identifier_list.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("pids_1900-01-01_"));

    let dates = std::fs::read_to_string(workdir.path().join("json/colA/dates.txt")).unwrap();
    assert_eq!(dates, "2024-01-01\n2024-01-02\n");
    let watermark = std::fs::read_to_string(workdir.path().join("json/colA/lastdate.txt")).unwrap();
    assert_eq!(watermark.trim(), "2024-01-02");
}

#[tokio::test]
async fn test_current_local_copy_is_not_fetched_or_modified() {
    let workdir = TempDir::new().unwrap();
    let data = workdir.path().join("json/colA/data");
    std::fs::create_dir_all(&data).unwrap();
    let local = br#"{"processing_date":"2024-01-01","note":"local copy"}"#;
    std::fs::write(data.join("pid001.json"), local).unwrap();

    let catalog = Arc::new(two_document_catalog());
    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());
    let summary = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(std::fs::read(data.join("pid001.json")).unwrap(), local);
    assert_eq!(summary.downloads.skipped_existing, 1);
    // only pid002 reached the catalog
    assert_eq!(catalog.fetch_calls(), 1);
}

#[tokio::test]
async fn test_stale_local_copy_is_refreshed() {
    let workdir = TempDir::new().unwrap();
    let data = workdir.path().join("json/colA/data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("pid001.json"), br#"{"processing_date":"2023-06-30"}"#).unwrap();
    std::fs::write(data.join("pid002.json"), b"not json").unwrap();

    let catalog = Arc::new(
        MockCatalog::new()
            .with_document("colA", "pid001", "2024-01-01", &article("pid001", "2024-01-01"))
            .with_document("colA", "pid002", "2024-01-02", &article("pid002", "2024-01-02")),
    );
    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());
    let summary = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(summary.downloads.written, 2);
    assert_eq!(summary.downloads.skipped_existing, 0);
    assert_eq!(std::fs::read(data.join("pid001.json")).unwrap(), article("pid001", "2024-01-01"));
    assert_eq!(std::fs::read(data.join("pid002.json")).unwrap(), article("pid002", "2024-01-02"));
}

#[tokio::test]
async fn test_undated_task_keeps_existing_file() {
    let workdir = TempDir::new().unwrap();
    let dest = workdir.path().join("pid001.json");
    std::fs::write(&dest, b"local copy").unwrap();
    let catalog = Arc::new(two_document_catalog());

    let id = DocumentId::new("colA", "pid001").unwrap();
    let task = FetchTask::new(id, &dest, DocumentFormat::json(), FetchOptions::default());
    let summary = DownloadExecutor::new(catalog.clone(), ShutdownCoordinator::shared())
        .execute(vec![task], &SilentProgress)
        .await
        .unwrap();

    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(catalog.fetch_calls(), 0);
    assert_eq!(std::fs::read(&dest).unwrap(), b"local copy");
}

#[tokio::test]
async fn test_panicking_download_is_counted_as_failure() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(
        MockCatalog::new()
            .with_document("colA", "pid001", "2024-01-01", b"{}")
            .with_panicking_document("colA", "pid002", "2024-01-02")
            .with_document("colA", "pid003", "2024-01-03", b"{}"),
    );
    let dumper = Dumper::new(catalog, workdir.path(), ShutdownCoordinator::shared());

    let summary = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(summary.downloads.written, 2);
    assert_eq!(summary.downloads.failed, 1);
    assert_eq!(summary.watermark, None);
}

#[tokio::test]
async fn test_overwrite_replaces_existing_file() {
    let workdir = TempDir::new().unwrap();
    let data = workdir.path().join("json/colA/data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("pid001.json"), b"local copy").unwrap();

    let dumper = Dumper::new(Arc::new(two_document_catalog()), workdir.path(), ShutdownCoordinator::shared())
        .with_options(FetchOptions {
            overwrite: true,
            preserve_null: false,
        });
    dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(std::fs::read(data.join("pid001.json")).unwrap(), br#"{"title":"x"}"#);
}

#[tokio::test]
async fn test_preserve_null_keeps_null_payloads() {
    let workdir = TempDir::new().unwrap();
    let dumper = Dumper::new(Arc::new(two_document_catalog()), workdir.path(), ShutdownCoordinator::shared())
        .with_options(FetchOptions {
            overwrite: false,
            preserve_null: true,
        });
    dumper.run_collection("colA", &SilentProgress).await.unwrap();

    let null_doc = workdir.path().join("json/colA/data/pid002.json");
    assert_eq!(std::fs::read(null_doc).unwrap(), b"null");
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(two_document_catalog());

    for _ in 0..2 {
        let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());
        dumper.run_collection("colA", &SilentProgress).await.unwrap();
    }

    let data = workdir.path().join("json/colA/data");
    let mut names: Vec<_> = std::fs::read_dir(&data)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["pid001.json"]);
    assert_eq!(std::fs::read(data.join("pid001.json")).unwrap(), br#"{"title":"x"}"#);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_window() {
    let workdir = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new().with_delay(Duration::from_millis(20));
    for i in 0..12 {
        catalog = catalog.with_document("colA", &format!("pid{i:03}"), "2024-01-01", b"{}");
    }
    let catalog = Arc::new(catalog);

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let id = DocumentId::new("colA", format!("pid{i:03}")).unwrap();
            let dest = workdir.path().join(format!("{}.json", id.pid()));
            FetchTask::new(id, dest, DocumentFormat::json(), FetchOptions::default())
        })
        .collect();

    let executor = DownloadExecutor::new(catalog.clone(), ShutdownCoordinator::shared()).with_concurrency(3);
    let summary = executor.execute(tasks, &SilentProgress).await.unwrap();

    assert_eq!(summary.written, 12);
    assert_eq!(catalog.fetch_calls(), 12);
    assert!(catalog.max_in_flight() <= 3, "max in flight: {}", catalog.max_in_flight());
    assert!(catalog.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_failure_is_isolated_and_holds_watermark() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(
        MockCatalog::new()
            .with_document("colA", "pid001", "2024-01-01", b"{}")
            .with_failing_document("colA", "pid002", "2024-01-05")
            .with_document("colA", "pid003", "2024-01-03", b"{}"),
    );
    let dumper = Dumper::new(catalog, workdir.path(), ShutdownCoordinator::shared());

    let summary = dumper.run_collection("colA", &SilentProgress).await.unwrap();

    assert_eq!(summary.downloads.written, 2);
    assert_eq!(summary.downloads.failed, 1);
    assert_eq!(summary.watermark, None);
    assert!(!workdir.path().join("json/colA/lastdate.txt").exists());
}

#[tokio::test]
async fn test_run_without_collection_uses_eligible_ones() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(
        MockCatalog::new()
            .with_collection("colA", "certified", true)
            .with_collection("colB", "development", true)
            .with_collection("colC", "diffusion", false)
            .with_document("colA", "a1", "2024-01-01", b"{}")
            .with_document("colB", "b1", "2024-01-01", b"{}"),
    );
    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared());

    let summaries = dumper.run(None, &SilentProgress).await.unwrap();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].collection, "colA");
    assert!(workdir.path().join("json/colA/data/a1.json").exists());
    assert!(!workdir.path().join("json/colB").exists());
}

#[tokio::test]
async fn test_concurrent_run_on_same_collection_is_refused() {
    use articlemeta_dump::dumper::DumpError;
    use articlemeta_dump::resume::{ResumeError, RunLock};

    let workdir = TempDir::new().unwrap();
    let dumper = Dumper::new(Arc::new(two_document_catalog()), workdir.path(), ShutdownCoordinator::shared());
    let _held = RunLock::try_acquire(&dumper.layout().collection("colA").lock_path()).unwrap();

    let result = dumper.run_collection("colA", &SilentProgress).await;

    assert!(matches!(result, Err(DumpError::Resume(ResumeError::Locked(_)))));
}

#[tokio::test]
async fn test_export_dates_of_stored_documents() {
    let workdir = TempDir::new().unwrap();
    let body = br#"{"code":"pid001","collection":"colA","processing_date":"2024-01-01","publication_date":"2023-11","article":{"v112":[{"_":"20230415"}]}}"#;
    let catalog = Arc::new(
        MockCatalog::new()
            .with_document("colA", "pid001", "2024-01-01", body)
            .with_document("colA", "pid002", "2024-01-01", b"{broken"),
    );
    let dumper = Dumper::new(catalog, workdir.path(), ShutdownCoordinator::shared());
    dumper.run_collection("colA", &SilentProgress).await.unwrap();

    let output = workdir.path().join("dates.csv");
    let summary = dumper.export_dates("colA", &output).unwrap();

    assert_eq!(summary.rows, 1);
    assert_eq!(summary.skipped, 1);
    let mut reader = csv::Reader::from_path(&output).unwrap();
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[2], "pid001");
    assert_eq!(&row[3], "2023");
    assert_eq!(&row[4], "2023-04-15");
}

#[tokio::test]
async fn test_dumper_concurrency_is_clamped() {
    let workdir = TempDir::new().unwrap();
    let catalog = Arc::new(MockCatalog::new());

    let dumper = Dumper::new(catalog.clone(), workdir.path(), ShutdownCoordinator::shared()).with_concurrency(100);
    assert_eq!(dumper.concurrency(), 32);

    let dumper = Dumper::new(catalog, workdir.path(), ShutdownCoordinator::shared()).with_concurrency(0);
    assert_eq!(dumper.concurrency(), 1);
}
