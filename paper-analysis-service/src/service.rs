use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use paper_flow::{AnalysisError, AnalysisTaskManager, ErrorKind, TaskId};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};

use crate::{
    config::ServiceConfig,
    models::{CompareRequest, CompareResponse, TaskStatusResponse, UploadResponse},
    ollama::OllamaGateway,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "task_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn analysis_error(error: &AnalysisError) -> ApiError {
    match (error.kind(), error) {
        (_, AnalysisError::TaskNotFound(task_id)) => not_found_error("Task not found", task_id),
        (ErrorKind::InvalidInput, _) => bad_request_error(&error.to_string()),
        (ErrorKind::Timeout, _) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": error.to_string() })),
        ),
        (ErrorKind::UpstreamError, _) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": error.to_string() })),
        ),
        _ => {
            error!("Analysis request failed: {}", error);
            internal_error("Analysis request failed", &error.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub analyses: AnalysisTaskManager,
    pub max_upload_bytes: usize,
}

pub fn create_app(config: &ServiceConfig) -> Router {
    build_router(create_app_state(config))
}

pub fn create_app_state(config: &ServiceConfig) -> AppState {
    let gateway = Arc::new(OllamaGateway::new(
        config.ollama_host.clone(),
        config.ollama_model.clone(),
    ));
    let analyses = AnalysisTaskManager::builder(gateway)
        .limits(config.limits)
        .build();

    AppState {
        analyses,
        max_upload_bytes: config.max_upload_bytes,
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let max_upload_bytes = app_state.max_upload_bytes;
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/v1/upload-paper", post(upload_paper))
        .route("/api/v1/task-status/{task_id}", get(task_status))
        .route("/api/v1/compare-papers", post(compare_papers))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Periodically drop finished tasks older than `retention`.
pub fn spawn_retention_sweep(analyses: AnalysisTaskManager, retention: Duration) -> JoinHandle<()> {
    let period = retention.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            analyses.purge_finished(retention);
        }
    })
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Research Paper Analysis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Section extraction and LLM summaries for uploaded research papers",
        "endpoints": {
            "POST /api/v1/upload-paper": "Upload a PDF (multipart field 'file') and start analysis",
            "GET /api/v1/task-status/{task_id}": "Poll analysis status and results",
            "POST /api/v1/compare-papers": "Compare two or more completed analyses (JSON body {task_ids})",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

struct FileUpload {
    filename: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<FileUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), Json(json!({ "error": e.body_text() }))))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| (e.status(), Json(json!({ "error": e.body_text() }))))?;
        return Ok(FileUpload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err(bad_request_error("Multipart field 'file' is required"))
}

async fn upload_paper(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let upload = read_file_field(&mut multipart).await?;
    info!(
        "Received paper upload {:?} ({} bytes)",
        upload.filename,
        upload.bytes.len()
    );

    let task_id = state
        .analyses
        .submit(upload.filename.as_deref(), upload.bytes)
        .map_err(|e| analysis_error(&e))?;

    Ok(Json(UploadResponse {
        task_id: task_id.to_string(),
        status: "processing",
    }))
}

async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<TaskStatusResponse> {
    debug!("Getting status for task: {}", task_id);

    let view = task_id
        .parse::<TaskId>()
        .and_then(|id| state.analyses.status(&id))
        .map_err(|e| analysis_error(&e))?;

    Ok(Json(view.into()))
}

async fn compare_papers(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> ApiResult<CompareResponse> {
    info!("Comparing papers: {:?}", request.task_ids);

    let ids = request
        .task_ids
        .iter()
        .map(|id| id.parse::<TaskId>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| analysis_error(&e))?;

    let comparison = state
        .analyses
        .compare(&ids)
        .await
        .map_err(|e| analysis_error(&e))?;

    Ok(Json(CompareResponse {
        task_ids: request.task_ids,
        comparison,
    }))
}
