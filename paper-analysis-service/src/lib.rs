pub mod config;
pub mod models;
pub mod ollama;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use ollama::OllamaGateway;
pub use service::{AppState, build_router, create_app, create_app_state, spawn_retention_sweep};
