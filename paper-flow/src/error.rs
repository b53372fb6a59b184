use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Coarse classification of an [`AnalysisError`], stable enough to expose to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Timeout,
    UpstreamError,
    Extraction,
    Internal,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("{stage} timed out after {:.1}s", .after.as_secs_f64())]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    #[error("Model gateway failed: {0}")]
    Upstream(#[from] GatewayError),

    #[error("Could not read PDF: {0}")]
    Extraction(String),

    #[error("Analysis worker crashed: {0}")]
    WorkerCrashed(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalysisError::TaskNotFound(_) => ErrorKind::NotFound,
            AnalysisError::Timeout { .. } => ErrorKind::Timeout,
            AnalysisError::Upstream(GatewayError::Timeout(_)) => ErrorKind::Timeout,
            AnalysisError::Upstream(_) => ErrorKind::UpstreamError,
            AnalysisError::Extraction(_) => ErrorKind::Extraction,
            AnalysisError::WorkerCrashed(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
