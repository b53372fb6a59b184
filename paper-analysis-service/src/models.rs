use paper_flow::{AnalysisReport, ComparisonOutcome, ErrorKind, TaskView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub task_id: String,
    pub status: &'static str,
}

/// Body of `GET /api/v1/task-status/{task_id}`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatusResponse {
    Processing {
        elapsed_time_seconds: f64,
    },
    Completed {
        result: Arc<AnalysisReport>,
    },
    Error {
        error: String,
        error_kind: ErrorKind,
    },
}

impl From<TaskView> for TaskStatusResponse {
    fn from(view: TaskView) -> Self {
        match view {
            TaskView::Processing { elapsed, .. } => TaskStatusResponse::Processing {
                elapsed_time_seconds: elapsed.as_secs_f64(),
            },
            TaskView::Completed(report) => TaskStatusResponse::Completed { result: report },
            TaskView::Failed(failure) => TaskStatusResponse::Error {
                error: failure.message,
                error_kind: failure.kind,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub task_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub task_ids: Vec<String>,
    pub comparison: ComparisonOutcome,
}
