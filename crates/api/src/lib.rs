//! Attention Monitor API Server
//!
//! Accepts recorded webcam videos, runs the eye-tracking analysis and serves
//! the rendered plots.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod error;
pub mod pipeline;
mod routes;

pub use config::{AppConfig, LogFormat, ServerConfig};
pub use error::ApiError;
pub use pipeline::{
    AnalysisPipeline, FfmpegBackend, PipelineError, PipelineReport, RenderTargets, VideoBackend,
};

use config::AssistantConfig;
use storage::{Repository, SessionStore, StorageError};

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    /// Session video and plot files
    pub session: SessionStore,
    /// Recent analysis results
    pub history: Repository,
    pub assistant: AssistantConfig,
    pub http: reqwest::Client,
    /// Transcode uploads even when the request does not ask for it
    pub transcode_always: bool,
    pub version: String,
    pub start_time: Instant,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<RwLock<AppState>>;

impl AppState {
    pub fn new(config: &AppConfig, pipeline: AnalysisPipeline) -> Result<Self, StorageError> {
        let session = SessionStore::new(config.storage.clone())?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            session,
            history: Repository::new(config.storage.history_limit),
            assistant: config.assistant.clone(),
            http: reqwest::Client::new(),
            transcode_always: config.transcode.always,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(
    state: SharedState,
    plots_dir: &std::path::Path,
    server: &ServerConfig,
) -> Router {
    Router::new()
        .route("/upload_video", post(routes::video::upload_video))
        .route("/analyze_latest", get(routes::video::analyze_latest))
        .route("/openai", post(routes::assistant::chat))
        .route("/api/v1/health", get(routes::health::health_handler))
        .route("/metrics", get(routes::health::metrics_handler))
        .nest_service("/plots", ServeDir::new(plots_dir))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(
    level: &str,
    format: LogFormat,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
}

/// Run the server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let pipeline = AnalysisPipeline::from_config(&config)?;
    let state = AppState::new(&config, pipeline)?.with_metrics(handle);
    let plots_dir = state.session.ensure_dir()?.to_path_buf();
    info!("Videos directory: {}", plots_dir.display());

    let state = Arc::new(RwLock::new(state));
    let app = create_router(state, &plots_dir, &config.server);

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
