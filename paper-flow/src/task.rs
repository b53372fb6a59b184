use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::{
    error::{AnalysisError, ErrorKind},
    gateway::{KeyPointsOutcome, SummaryOutcome},
    related::RelatedPapers,
    sections::ParsedDocument,
};

/// Opaque identifier handed out at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(TaskId)
            .map_err(|_| AnalysisError::TaskNotFound(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Model summary of the paper. `degraded` is set when the model did not answer
/// in time and `text` is a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub text: String,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageStats {
    pub total: usize,
    pub skipped: usize,
}

/// Everything produced by a successful analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub document: ParsedDocument,
    pub summary: Summary,
    pub structured_summary: SummaryOutcome,
    pub key_points: KeyPointsOutcome,
    pub related_papers: RelatedPapers,
    pub pages: PageStats,
}

impl AnalysisReport {
    /// Condensed text of this paper handed to the model when papers are compared.
    /// Uses the sectioned summary when there is one, the plain summary otherwise.
    pub fn digest(&self) -> String {
        let mut digest = format!("Title: {}\n", self.document.title);
        match self.structured_summary.parsed() {
            Some(structured) => {
                for (heading, points) in structured.sections() {
                    digest.push_str(&format!("\n{}:\n", heading));
                    for point in points {
                        digest.push_str(&format!("- {}\n", point));
                    }
                }
            }
            None => digest.push_str(&format!("\nSummary:\n{}\n", self.summary.text)),
        }
        digest
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AnalysisError> for TaskFailure {
    fn from(error: &AnalysisError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Lifecycle state. Terminal variants own their payload so a reader can never
/// see `Completed` without its report.
#[derive(Debug, Clone)]
pub(crate) enum TaskState {
    Pending,
    Processing,
    Completed(Arc<AnalysisReport>),
    Failed(TaskFailure),
}

impl TaskState {
    fn status(&self) -> TaskStatus {
        match self {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Processing => TaskStatus::Processing,
            TaskState::Completed(_) => TaskStatus::Completed,
            TaskState::Failed(_) => TaskStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub id: TaskId,
    pub submitted_at: DateTime<Utc>,
    started: Instant,
    finished: Option<Instant>,
    pub(crate) state: TaskState,
}

impl AnalysisTask {
    pub(crate) fn pending(id: TaskId) -> Self {
        Self {
            id,
            submitted_at: Utc::now(),
            started: Instant::now(),
            finished: None,
            state: TaskState::Pending,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time since the task reached a terminal state, `None` while it is still running.
    pub fn since_finished(&self) -> Option<Duration> {
        self.finished.map(|at| at.elapsed())
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        if state.status().is_terminal() {
            self.finished = Some(Instant::now());
        }
        self.state = state;
    }

    pub fn view(&self) -> TaskView {
        match &self.state {
            TaskState::Pending | TaskState::Processing => TaskView::Processing {
                status: self.status(),
                elapsed: self.elapsed(),
            },
            TaskState::Completed(report) => TaskView::Completed(report.clone()),
            TaskState::Failed(failure) => TaskView::Failed(failure.clone()),
        }
    }
}

/// What a status query sees. Pending tasks are reported as in progress.
#[derive(Debug, Clone)]
pub enum TaskView {
    Processing { status: TaskStatus, elapsed: Duration },
    Completed(Arc<AnalysisReport>),
    Failed(TaskFailure),
}

impl TaskView {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskView::Processing { status, .. } => *status,
            TaskView::Completed(_) => TaskStatus::Completed,
            TaskView::Failed(_) => TaskStatus::Failed,
        }
    }
}
