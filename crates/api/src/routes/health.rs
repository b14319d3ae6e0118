//! Health and Metrics Routes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use storage::AnalysisRecord;

use crate::SharedState;

/// Analyses listed in the health response
const RECENT_ANALYSES: usize = 5;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub session: SessionStatus,
}

/// Session directory status
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub has_video: bool,
    pub analyses: usize,
    pub last_analyzed_at: Option<DateTime<Utc>>,
    /// Newest first
    pub recent: Vec<AnalysisSummary>,
}

/// Compact view of a stored analysis
#[derive(Debug, Serialize)]
pub struct AnalysisSummary {
    pub id: i64,
    pub analyzed_at: DateTime<Utc>,
    pub frames: usize,
    pub data_count: usize,
    pub slope: f64,
    pub paying_ratio: f64,
}

impl From<&AnalysisRecord> for AnalysisSummary {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            id: record.id,
            analyzed_at: record.analyzed_at,
            frames: record.frames,
            data_count: record.stats.data_count,
            slope: record.stats.slope,
            paying_ratio: record.attention.paying_ratio(),
        }
    }
}

/// Health check handler
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session: SessionStatus {
            has_video: state.session.has_video(),
            analyses: state.history.count(),
            last_analyzed_at: state.history.latest().ok().map(|r| r.analyzed_at),
            recent: state
                .history
                .recent(RECENT_ANALYSES)
                .unwrap_or_default()
                .iter()
                .map(AnalysisSummary::from)
                .collect(),
        },
    })
}

/// Prometheus text exposition
pub async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics exporter not installed".to_string()),
    }
}
