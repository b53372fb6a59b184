use paper_analysis_service::{ServiceConfig, build_router, create_app_state, spawn_retention_sweep};
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServiceConfig::from_env()?;
    info!(
        "Using model {} at {} (analysis timeout {:?})",
        config.ollama_model, config.ollama_host, config.limits.analysis_timeout
    );

    let state = create_app_state(&config);
    if let Some(retention) = config.task_retention {
        info!("Finished tasks are purged after {:?}", retention);
        spawn_retention_sweep(state.analyses.clone(), retention);
    }

    let app = build_router(state);
    let listener = TcpListener::bind(config.bind_address()).await?;
    let addr = listener.local_addr()?;

    info!("Research Paper Analysis Service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Upload endpoint: POST http://{}/api/v1/upload-paper", addr);
    info!("Status endpoint: GET http://{}/api/v1/task-status/{{task_id}}", addr);
    info!("Compare endpoint: POST http://{}/api/v1/compare-papers", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
