//! Tests for DocumentationService

mod common;

use common::{small_catalog, GatedProvider};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use sqldoc_catalog::Category;
use sqldoc_render::{default_formatter, DocumentationAssembler, OutputFormat};
use sqldoc_services::{
    DocumentationService, RunOutcome, RunProgress, RunProgressCallback, RunRequest, ServiceError,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const ALL_FORMATS: [OutputFormat; 3] = [OutputFormat::Html, OutputFormat::Markdown, OutputFormat::Json];

fn service() -> DocumentationService {
    DocumentationService::new(DocumentationAssembler::new(default_formatter()))
}

fn request(provider: GatedProvider, dir: &Path) -> RunRequest {
    RunRequest::new(Arc::new(provider), ALL_FORMATS, dir)
}

fn recorder() -> (RunProgressCallback, Arc<Mutex<Vec<RunProgress>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: RunProgressCallback = Arc::new(move |event: RunProgress| sink.lock().push(event));
    (callback, events)
}

/// Progress callback that cancels the run when `when` accepts an event
fn cancel_on(
    when: fn(&RunProgress) -> bool,
) -> (RunProgressCallback, Arc<Mutex<Option<CancellationToken>>>) {
    let slot: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let token = slot.clone();
    let callback: RunProgressCallback = Arc::new(move |event: RunProgress| {
        if when(&event) {
            if let Some(token) = token.lock().as_ref() {
                token.cancel();
            }
        }
    });
    (callback, slot)
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[tokio::test]
async fn completed_run_writes_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let (progress, events) = recorder();
    let service = service();

    let outcome = service
        .run(request(GatedProvider::open(small_catalog()), dir.path()).with_progress(progress))
        .await
        .unwrap();

    let report = outcome.report().expect("run should complete");
    assert!(report.is_complete());
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.model.metadata.database_name, "sales");
    assert_eq!(report.model.statistics.total_tables, 2);
    assert_eq!(report.written_paths().len(), 3);
    assert_eq!(file_names(dir.path()), vec!["sales.html", "sales.json", "sales.md"]);
    assert!(!service.is_running());

    let events = events.lock();
    assert!(matches!(events.first(), Some(RunProgress::Started { run_id }) if *run_id == report.run_id));
    assert_eq!(events.last(), Some(&RunProgress::Finished));
    assert!(events.contains(&RunProgress::Extracted { tables: 2, warnings: 0 }));
    assert!(events.contains(&RunProgress::Assembling { formats: 3 }));
    let last_extracting = events
        .iter()
        .filter_map(|e| match e {
            RunProgress::Extracting(p) => Some(*p),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(last_extracting.completed, last_extracting.total);
}

#[tokio::test]
async fn second_start_while_active_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let service = service();

    let first = service
        .start(request(GatedProvider::gated(small_catalog(), gate.clone()), dir.path()))
        .unwrap();
    assert!(service.is_running());

    let second = service.start(request(GatedProvider::open(small_catalog()), dir.path()));
    assert!(matches!(second, Err(ServiceError::RunInProgress)));

    gate.notify_one();
    assert!(matches!(first.wait().await, RunOutcome::Completed(_)));
    assert!(!service.is_running());

    let third = service
        .start(request(GatedProvider::open(small_catalog()), dir.path()))
        .unwrap();
    assert!(matches!(third.wait().await, RunOutcome::Completed(_)));
}

#[tokio::test]
async fn run_without_formats_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = RunRequest::new(
        Arc::new(GatedProvider::open(small_catalog())),
        Vec::<OutputFormat>::new(),
        dir.path(),
    );

    assert!(matches!(service().start(request), Err(ServiceError::NoFormats)));
}

#[tokio::test]
async fn cancel_during_extraction_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("docs");
    let gate = Arc::new(Notify::new());
    let service = service();

    let handle = service
        .start(request(GatedProvider::gated(small_catalog(), gate.clone()), &out))
        .unwrap();
    handle.cancel();
    gate.notify_one();

    assert!(matches!(handle.wait().await, RunOutcome::Cancelled));
    assert!(file_names(&out).is_empty());
    assert!(!service.is_running());
}

#[tokio::test]
async fn cancel_between_extraction_and_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let (progress, slot) = cancel_on(|e| matches!(e, RunProgress::Extracted { .. }));
    let service = service();

    let handle = service
        .start(request(GatedProvider::open(small_catalog()), dir.path()).with_progress(progress))
        .unwrap();
    *slot.lock() = Some(handle.cancellation_token());

    assert!(matches!(handle.wait().await, RunOutcome::Cancelled));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn cancel_during_assembly_removes_written_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
    let (progress, slot) = cancel_on(|e| matches!(e, RunProgress::Assembling { .. }));
    let service = service();

    let handle = service
        .start(request(GatedProvider::open(small_catalog()), dir.path()).with_progress(progress))
        .unwrap();
    *slot.lock() = Some(handle.cancellation_token());

    assert!(matches!(handle.wait().await, RunOutcome::Cancelled));
    assert_eq!(file_names(dir.path()), vec!["notes.txt"]);
}

#[tokio::test]
async fn connection_failure_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();

    let outcome = service
        .run(request(GatedProvider::refusing(), dir.path()))
        .await
        .unwrap();

    match outcome {
        RunOutcome::Failed(error) => assert!(error.is_connection_failure(), "{error}"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(file_names(dir.path()).is_empty());
    assert!(!service.is_running());
}

#[tokio::test]
async fn category_failures_are_grouped_in_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = small_catalog()
        .with_query_failure("sqldoc:indexes */", "permission denied on sys.indexes")
        .with_query_failure("sqldoc:triggers */", "permission denied on sys.triggers");

    let outcome = service()
        .run(request(GatedProvider::open(catalog), dir.path()))
        .await
        .unwrap();

    let report = outcome.report().unwrap();
    let grouped = report.warnings_by_category();
    assert_eq!(
        grouped.keys().copied().collect::<Vec<_>>(),
        vec![Category::Indexes, Category::Triggers]
    );
    assert!(report.is_complete());
    assert_eq!(report.model.statistics.total_tables, 2);
}

#[tokio::test]
async fn failed_format_is_reported_without_failing_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let assembler = DocumentationAssembler::new(default_formatter())
        .with_template_source(OutputFormat::Html, "{{ doc.not_a_field }}")
        .unwrap();
    let service = DocumentationService::new(assembler);

    let outcome = service
        .run(request(GatedProvider::open(small_catalog()), dir.path()))
        .await
        .unwrap();

    let report = outcome.into_result().unwrap().unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.failed_formats(), vec![OutputFormat::Html]);
    assert_eq!(file_names(dir.path()), vec!["sales.json", "sales.md"]);
}
