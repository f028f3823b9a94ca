//! Documentation run requests, progress and outcomes

use crate::{ServiceError, ServiceResult};
use sqldoc_catalog::{Category, ExtractionProgress, ExtractionWarning, ExtractorConfig, SchemaModel};
use sqldoc_core::ConnectionProvider;
use sqldoc_render::{FormatOutcome, OutputFormat};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Progress events of one run, in the order they happen
#[derive(Debug, Clone, PartialEq)]
pub enum RunProgress {
    Started { run_id: Uuid },
    Extracting(ExtractionProgress),
    Extracted { tables: usize, warnings: usize },
    Assembling { formats: usize },
    Finished,
}

pub type RunProgressCallback = Arc<dyn Fn(RunProgress) + Send + Sync>;

/// Everything one run needs
pub struct RunRequest {
    pub provider: Arc<dyn ConnectionProvider>,
    pub extractor: ExtractorConfig,
    pub formats: BTreeSet<OutputFormat>,
    pub output_dir: PathBuf,
    pub progress: Option<RunProgressCallback>,
}

impl RunRequest {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        formats: impl IntoIterator<Item = OutputFormat>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            extractor: ExtractorConfig::default(),
            formats: formats.into_iter().collect(),
            output_dir: output_dir.into(),
            progress: None,
        }
    }

    pub fn with_extractor_config(mut self, config: ExtractorConfig) -> Self {
        self.extractor = config;
        self
    }

    pub fn with_progress(mut self, progress: RunProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub(crate) fn report(&self, event: RunProgress) {
        if let Some(progress) = &self.progress {
            progress(event);
        }
    }
}

/// A successful run: the model, its warnings and one outcome per format
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub model: Arc<SchemaModel>,
    pub warnings: Vec<ExtractionWarning>,
    pub outputs: Vec<FormatOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Paths of the documents that were written
    pub fn written_paths(&self) -> Vec<&Path> {
        self.outputs
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn failed_formats(&self) -> Vec<OutputFormat> {
        self.outputs
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.format)
            .collect()
    }

    /// True when every requested format was written
    pub fn is_complete(&self) -> bool {
        self.outputs.iter().all(FormatOutcome::is_success)
    }

    pub fn warnings_by_category(&self) -> BTreeMap<Category, Vec<&ExtractionWarning>> {
        let mut grouped: BTreeMap<Category, Vec<&ExtractionWarning>> = BTreeMap::new();
        for warning in &self.warnings {
            grouped.entry(warning.category()).or_default().push(warning);
        }
        grouped
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    Failed(ServiceError),
    /// Cancelled before finishing. No model is exposed and files written by
    /// the run have been removed.
    Cancelled,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn into_result(self) -> ServiceResult<Option<RunReport>> {
        match self {
            RunOutcome::Completed(report) => Ok(Some(report)),
            RunOutcome::Failed(error) => Err(error),
            RunOutcome::Cancelled => Ok(None),
        }
    }
}

/// Handle to a run executing in the background
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub(crate) fn new(run_id: Uuid, cancel: CancellationToken, task: JoinHandle<RunOutcome>) -> Self {
        Self {
            run_id,
            cancel,
            task,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Ask the run to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this run, for signal handlers and callbacks
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end
    pub async fn wait(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::Failed(ServiceError::TaskFailed(e.to_string())),
        }
    }
}
