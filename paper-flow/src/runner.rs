//! AnalysisTaskManager – accepts uploaded papers, runs each analysis in the background and
//! answers status queries while it runs.
//!
//! ## Lifecycle
//! `submit` validates the upload, registers a `Pending` task and returns its id straight away.
//! A spawned supervisor then moves the task to `Processing` and drives the actual work in a
//! second spawned task, so that a panic or an overrun in the work itself still ends with the
//! supervisor recording `Failed`:
//!
//! ```text
//! submit ──► Pending ──► Processing ──┬──► Completed(report)
//!                                     └──► Failed(kind, message)
//! ```
//!
//! ## Time limits
//! * **file read**: per-page text extraction runs on the blocking pool under
//!   [`AnalysisLimits::file_read_timeout`]. Overrunning fails the task.
//! * **model calls**: summary, structured summary and key points each run under
//!   [`AnalysisLimits::model_call_timeout`]. Overrunning *degrades* the field
//!   (placeholder summary, fallback outcomes) and the task still completes.
//!   [`AnalysisTaskManager::compare`] is bounded by the same limit but fails instead.
//! * **whole analysis**: [`AnalysisLimits::analysis_timeout`]. Overrunning aborts the worker
//!   and fails the task with [`ErrorKind::Timeout`](crate::ErrorKind::Timeout).

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::{
    error::{AnalysisError, Result},
    gateway::{ComparisonOutcome, GatewayError, Interpreted, ModelGateway, ModelReply},
    pdf::{JoinedText, LopdfPageText, PageTextSource, join_pages, looks_like_pdf},
    related::{PaperIndex, UnconfiguredIndex},
    sections::SectionExtractor,
    storage::TaskRegistry,
    task::{AnalysisReport, PageStats, Summary, TaskId, TaskView},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    pub file_read_timeout: Duration,
    pub analysis_timeout: Duration,
    pub model_call_timeout: Duration,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            file_read_timeout: Duration::from_secs(30),
            analysis_timeout: Duration::from_secs(300),
            model_call_timeout: Duration::from_secs(120),
        }
    }
}

/// Reject anything that is not a non-empty PDF upload.
pub fn validate_upload(filename: Option<&str>, pdf: &[u8]) -> Result<()> {
    if pdf.is_empty() {
        return Err(AnalysisError::InvalidInput("uploaded file is empty".to_string()));
    }
    if let Some(name) = filename {
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(AnalysisError::InvalidInput(format!(
                "only PDF files are accepted, got '{}'",
                name
            )));
        }
    }
    if !looks_like_pdf(pdf) {
        return Err(AnalysisError::InvalidInput(
            "uploaded file is not a PDF document".to_string(),
        ));
    }
    Ok(())
}

struct AnalysisPipeline {
    pages: Arc<dyn PageTextSource>,
    gateway: Arc<dyn ModelGateway>,
    index: Arc<dyn PaperIndex>,
    limits: AnalysisLimits,
}

/// Owns the task registry and schedules analyses. Cheap to clone.
#[derive(Clone)]
pub struct AnalysisTaskManager {
    registry: TaskRegistry,
    pipeline: Arc<AnalysisPipeline>,
}

impl AnalysisTaskManager {
    pub fn builder(gateway: Arc<dyn ModelGateway>) -> AnalysisTaskManagerBuilder {
        AnalysisTaskManagerBuilder::new(gateway)
    }

    pub fn limits(&self) -> AnalysisLimits {
        self.pipeline.limits
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Register an upload and schedule its analysis. Must be called from within a Tokio
    /// runtime. Invalid uploads are rejected before any id is allocated.
    pub fn submit(&self, filename: Option<&str>, pdf: Vec<u8>) -> Result<TaskId> {
        validate_upload(filename, &pdf)?;

        let id = self.registry.create();
        info!(
            "Task {} accepted ({} bytes, file {:?})",
            id,
            pdf.len(),
            filename
        );

        tokio::spawn(process_one(
            self.registry.clone(),
            self.pipeline.clone(),
            id,
            pdf,
        ));

        Ok(id)
    }

    pub fn status(&self, id: &TaskId) -> Result<TaskView> {
        self.registry.view(id)
    }

    /// Ask the model to compare two or more completed analyses.
    pub async fn compare(&self, ids: &[TaskId]) -> Result<ComparisonOutcome> {
        if ids.len() < 2 {
            return Err(AnalysisError::InvalidInput(
                "at least two papers are needed for a comparison".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        let mut digests = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                return Err(AnalysisError::InvalidInput(format!(
                    "task {} is listed more than once",
                    id
                )));
            }
            match self.registry.view(id)? {
                TaskView::Completed(report) => digests.push(report.digest()),
                other => {
                    return Err(AnalysisError::InvalidInput(format!(
                        "task {} is {:?}, only completed analyses can be compared",
                        id,
                        other.status()
                    )));
                }
            }
        }

        let limit = self.pipeline.limits.model_call_timeout;
        let comparison =
            bounded(limit, self.pipeline.gateway.compare_papers(&digests, limit)).await?;
        info!(
            "Compared {} papers (fallback: {})",
            ids.len(),
            comparison.is_fallback()
        );
        Ok(comparison)
    }

    /// Drop tasks that finished at least `retention` ago.
    pub fn purge_finished(&self, retention: Duration) -> usize {
        let purged = self.registry.purge_finished(retention);
        if purged > 0 {
            info!("Purged {} finished tasks", purged);
        }
        purged
    }
}

pub struct AnalysisTaskManagerBuilder {
    gateway: Arc<dyn ModelGateway>,
    pages: Arc<dyn PageTextSource>,
    index: Arc<dyn PaperIndex>,
    limits: AnalysisLimits,
    registry: TaskRegistry,
}

impl AnalysisTaskManagerBuilder {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            pages: Arc::new(LopdfPageText),
            index: Arc::new(UnconfiguredIndex),
            limits: AnalysisLimits::default(),
            registry: TaskRegistry::new(),
        }
    }

    pub fn page_source(mut self, pages: Arc<dyn PageTextSource>) -> Self {
        self.pages = pages;
        self
    }

    pub fn paper_index(mut self, index: Arc<dyn PaperIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn limits(mut self, limits: AnalysisLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> AnalysisTaskManager {
        AnalysisTaskManager {
            registry: self.registry,
            pipeline: Arc::new(AnalysisPipeline {
                pages: self.pages,
                gateway: self.gateway,
                index: self.index,
                limits: self.limits,
            }),
        }
    }
}

/// Supervisor for one task: whatever happens to the worker, exactly one terminal state is
/// recorded.
async fn process_one(
    registry: TaskRegistry,
    pipeline: Arc<AnalysisPipeline>,
    id: TaskId,
    pdf: Vec<u8>,
) {
    registry.mark_processing(&id);
    info!("Task {} processing", id);

    let limit = pipeline.limits.analysis_timeout;
    let worker = tokio::spawn(async move { pipeline.analyze(pdf).await });
    let abort = worker.abort_handle();

    let outcome = match tokio::time::timeout(limit, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(AnalysisError::WorkerCrashed(describe_join_error(
            join_error,
        ))),
        Err(_) => {
            abort.abort();
            Err(AnalysisError::Timeout {
                stage: "analysis",
                after: limit,
            })
        }
    };

    match &outcome {
        Ok(report) => info!(
            "Task {} completed: {} figures, summary degraded: {}",
            id,
            report.document.figures.len(),
            report.summary.degraded
        ),
        Err(e) => error!("Task {} failed: {}", id, e),
    }

    registry.finish(&id, outcome);
}

fn describe_join_error(join_error: JoinError) -> String {
    if join_error.is_panic() {
        describe_panic(join_error.into_panic())
    } else {
        join_error.to_string()
    }
}

fn describe_panic(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

async fn bounded<T, F>(limit: Duration, call: F) -> std::result::Result<T, GatewayError>
where
    F: Future<Output = std::result::Result<T, GatewayError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(GatewayError::Timeout(limit)))
}

impl AnalysisPipeline {
    async fn analyze(&self, pdf: Vec<u8>) -> Result<AnalysisReport> {
        let joined = self.read_pages(pdf).await?;
        info!(
            "Extracted {} characters from {} pages ({} skipped)",
            joined.text.len(),
            joined.total_pages,
            joined.skipped_pages
        );

        let document = SectionExtractor::extract(&joined.text);
        let body = document.analysis_body();

        let limit = self.limits.model_call_timeout;
        let (summary, structured_summary, key_points) = tokio::join!(
            self.summarize(&body),
            self.interpreted(self.gateway.structured_summary(&body, limit)),
            self.interpreted(self.gateway.extract_key_points(&body, limit)),
        );
        let related_papers = self.index.similar_to(&document).await;

        Ok(AnalysisReport {
            document,
            summary: summary?,
            structured_summary: structured_summary?,
            key_points: key_points?,
            related_papers,
            pages: PageStats {
                total: joined.total_pages,
                skipped: joined.skipped_pages,
            },
        })
    }

    async fn read_pages(&self, pdf: Vec<u8>) -> Result<JoinedText> {
        let pages = self.pages.clone();
        let limit = self.limits.file_read_timeout;
        // spawn_blocking work cannot be aborted; on timeout it finishes detached
        let extraction = tokio::task::spawn_blocking(move || pages.pages(&pdf));

        match tokio::time::timeout(limit, extraction).await {
            Ok(Ok(pages)) => Ok(join_pages(pages?)),
            Ok(Err(join_error)) => Err(AnalysisError::Extraction(format!(
                "text extraction crashed: {}",
                describe_join_error(join_error)
            ))),
            Err(_) => Err(AnalysisError::Timeout {
                stage: "PDF text extraction",
                after: limit,
            }),
        }
    }

    async fn summarize(&self, body: &str) -> Result<Summary> {
        let limit = self.limits.model_call_timeout;
        match bounded(limit, self.gateway.summarize(body, limit)).await {
            Ok(text) => Ok(Summary {
                text,
                degraded: false,
            }),
            Err(GatewayError::Timeout(after)) => {
                warn!("Summary timed out after {:?}, continuing without it", after);
                Ok(Summary {
                    text: format!(
                        "Summary unavailable: the model did not respond within {:.0} seconds.",
                        after.as_secs_f64()
                    ),
                    degraded: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Bound a structured model call; a timeout becomes a fallback outcome.
    async fn interpreted<T, F>(&self, call: F) -> Result<Interpreted<T>>
    where
        T: ModelReply,
        F: Future<Output = std::result::Result<Interpreted<T>, GatewayError>>,
    {
        match bounded(self.limits.model_call_timeout, call).await {
            Ok(outcome) => Ok(outcome),
            Err(GatewayError::Timeout(after)) => {
                warn!("{} timed out after {:?}, using fallback", T::LABEL, after);
                Ok(Interpreted::unavailable(after))
            }
            Err(e) => Err(e.into()),
        }
    }
}
