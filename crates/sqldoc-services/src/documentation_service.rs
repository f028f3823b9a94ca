//! Documentation run service
//!
//! Runs extraction and assembly as one background task. At most one run is
//! active per service; cancellation is honoured at category boundaries,
//! between extraction and assembly, and after assembly (where it removes the
//! files the run wrote).

use crate::error::{ServiceError, ServiceResult};
use crate::run::{RunHandle, RunOutcome, RunProgress, RunReport, RunRequest};
use sqldoc_catalog::{ExtractionOutcome, ExtractionProgress, MetadataExtractor};
use sqldoc_render::DocumentationAssembler;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Service for documentation runs
pub struct DocumentationService {
    assembler: Arc<DocumentationAssembler>,
    active: Arc<AtomicBool>,
}

/// Clears the active flag when the run task ends, however it ends
struct ActiveRun(Arc<AtomicBool>);

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DocumentationService {
    pub fn new(assembler: DocumentationAssembler) -> Self {
        Self {
            assembler: Arc::new(assembler),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a run in the background.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`ServiceError::RunInProgress`] while another run is active.
    pub fn start(&self, request: RunRequest) -> ServiceResult<RunHandle> {
        if request.formats.is_empty() {
            return Err(ServiceError::NoFormats);
        }
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("rejected documentation run, another run is active");
            return Err(ServiceError::RunInProgress);
        }
        let guard = ActiveRun(self.active.clone());

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let assembler = self.assembler.clone();
        let token = cancel.clone();
        let span = tracing::info_span!("documentation_run", %run_id);
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                execute(run_id, request, assembler, token).await
            }
            .instrument(span),
        );
        Ok(RunHandle::new(run_id, cancel, task))
    }

    /// Start a run and wait for it
    pub async fn run(&self, request: RunRequest) -> ServiceResult<RunOutcome> {
        Ok(self.start(request)?.wait().await)
    }
}

async fn execute(
    run_id: Uuid,
    request: RunRequest,
    assembler: Arc<DocumentationAssembler>,
    cancel: CancellationToken,
) -> RunOutcome {
    let started = Instant::now();
    request.report(RunProgress::Started { run_id });

    let mut extractor = MetadataExtractor::new(request.provider.clone(), request.extractor.clone());
    if let Some(progress) = request.progress.clone() {
        extractor = extractor.with_progress(Arc::new(move |p: ExtractionProgress| {
            progress(RunProgress::Extracting(p))
        }));
    }

    let extraction = match extractor.extract(&cancel).await {
        Ok(ExtractionOutcome::Complete(extraction)) => extraction,
        Ok(ExtractionOutcome::Cancelled) => {
            tracing::info!("documentation run cancelled during extraction");
            return RunOutcome::Cancelled;
        }
        Err(e) => {
            tracing::error!(error = %e, "extraction failed");
            return RunOutcome::Failed(e.into());
        }
    };
    request.report(RunProgress::Extracted {
        tables: extraction.model.tables.len(),
        warnings: extraction.warnings.len(),
    });

    if cancel.is_cancelled() {
        tracing::info!("documentation run cancelled before assembly");
        return RunOutcome::Cancelled;
    }

    let model = Arc::new(extraction.model);
    request.report(RunProgress::Assembling {
        formats: request.formats.len(),
    });
    let outputs = assembler
        .assemble(model.clone(), &request.formats, &request.output_dir)
        .await;

    if cancel.is_cancelled() {
        let written: Vec<PathBuf> = outputs
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect();
        remove_written(&written).await;
        tracing::info!(removed = written.len(), "documentation run cancelled after assembly");
        return RunOutcome::Cancelled;
    }

    request.report(RunProgress::Finished);
    let report = RunReport {
        run_id,
        model,
        warnings: extraction.warnings,
        outputs,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        written = report.written_paths().len(),
        failed = report.failed_formats().len(),
        warnings = report.warnings.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "documentation run finished"
    );
    RunOutcome::Completed(report)
}

async fn remove_written(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove cancelled output");
        }
    }
}
