//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use attention_engine::AnalysisError;
use eye_tracker::TrackerError;
use frame_capture::CaptureError;
use storage::StorageError;

use crate::pipeline::PipelineError;

/// Errors surfaced as JSON `{"error": ...}` responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("No data to analyze")]
    NoData,
    #[error("{0}")]
    Unprocessable(String),
    #[error("{error}")]
    Upstream {
        status: StatusCode,
        error: String,
        details: String,
    },
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NoData | ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Upstream { error, details, .. } => {
                json!({ "error": error, "details": details })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Analysis(AnalysisError::NoData { .. }) => ApiError::NoData,
            PipelineError::Analysis(e) => ApiError::Internal(e.to_string()),
            PipelineError::Capture(CaptureError::Unreadable(msg))
            | PipelineError::Tracker(TrackerError::SourceUnreadable(msg)) => {
                ApiError::Unprocessable(format!("Could not read video: {}", msg))
            }
            PipelineError::Tracker(TrackerError::Capture(CaptureError::Unreadable(msg))) => {
                ApiError::Unprocessable(format!("Could not read video: {}", msg))
            }
            PipelineError::Capture(CaptureError::Format(msg)) => {
                ApiError::Unprocessable(format!("Unsupported video: {}", msg))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
