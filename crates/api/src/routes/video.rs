//! Video Upload and Analysis Routes

use std::path::PathBuf;

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, Query, State,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use attention_engine::{AttentionBreakdown, TrendResult};
use storage::{AnalysisRecord, SessionStore};

use crate::error::ApiError;
use crate::pipeline::{AnalysisPipeline, PipelineReport, RenderTargets};
use crate::{AppState, SharedState};

const NO_VIDEO: &str = "No video file provided";

/// Query parameters for the upload endpoint
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Re-encode the upload to H.264 MP4 before analysis
    #[serde(default)]
    pub transcode: bool,
    /// Older client name for `transcode`
    #[serde(default)]
    pub save_with_opencv: bool,
}

/// Response for upload and re-analysis
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    pub plot_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pie_url: Option<String>,
    pub stats: TrendResult,
    pub attention: AttentionBreakdown,
    pub frames: usize,
    pub analysis_id: i64,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_error: Option<String>,
}

/// Upload a video, store it as the session video and analyze it
pub async fn upload_video(
    State(state): State<SharedState>,
    Query(params): Query<UploadQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| rejected(ApiError::BadRequest(NO_VIDEO.to_string())))?;

    // Writers hold the lock from the first byte saved to the end of the run
    let (filename, saved, size, state) = loop {
        let next = multipart.next_field().await.map_err(|e| {
            rejected(ApiError::BadRequest(format!("Invalid multipart body: {}", e)))
        })?;
        let Some(mut field) = next else {
            return Err(rejected(ApiError::BadRequest(NO_VIDEO.to_string())));
        };
        if field.name() != Some("video") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(rejected(ApiError::BadRequest("Empty filename".to_string())));
        }

        let state = state.write().await;
        let (saved, size) = receive_video(&state.session, &mut field)
            .await
            .map_err(rejected)?;
        break (filename, saved, size, state);
    };
    info!("Received {} ({} bytes), saved to {}", filename, size, saved.display());

    let transcode = params.transcode || params.save_with_opencv || state.transcode_always;
    let pipeline = state.pipeline.clone();
    let session = state.session.clone();
    let (report, conversion_error) = tokio::task::spawn_blocking(move || {
        let conversion_error = transcode.then(|| transcode_session(&pipeline, &session)).flatten();
        let report = pipeline.run(&session.video_path(), &render_targets(&session));
        (report, conversion_error)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Analysis task failed: {}", e)))?;

    let report = report.inspect_err(|e| error!("Error processing video: {}", e))?;
    let mut response = respond(&state, report, "Video uploaded and analyzed successfully")?;
    response.filepath = Some(saved.display().to_string());
    if let Some(err) = conversion_error {
        response.conversion_failed = Some(true);
        response.conversion_error = Some(err);
    }
    Ok(Json(response))
}

/// Re-run the analysis on the stored session video
pub async fn analyze_latest(
    State(state): State<SharedState>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let state = state.write().await;
    if !state.session.has_video() {
        return Err(ApiError::NotFound("No video found for analysis".to_string()));
    }

    let pipeline = state.pipeline.clone();
    let session = state.session.clone();
    let report = tokio::task::spawn_blocking(move || {
        pipeline.run(&session.video_path(), &render_targets(&session))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Analysis task failed: {}", e)))?
    .inspect_err(|e| error!("Error analyzing video: {}", e))?;

    Ok(Json(respond(&state, report, "Video analyzed successfully")?))
}

/// Count and log an upload turned away before analysis
fn rejected(err: ApiError) -> ApiError {
    metrics::counter!("attention_upload_failures_total").increment(1);
    error!("Rejected upload: {}", err);
    err
}

/// Stream the field into the session slot; returns the path and byte count
async fn receive_video(
    session: &SessionStore,
    field: &mut Field<'_>,
) -> Result<(PathBuf, u64), ApiError> {
    let mut upload = session.begin_video().await?;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                upload.abort().await;
                return Err(ApiError::BadRequest(format!("Failed to read upload: {}", e)));
            }
        };
        if let Err(e) = upload.write_chunk(&chunk).await {
            upload.abort().await;
            return Err(e.into());
        }
    }

    let size = upload.bytes_written();
    Ok((upload.commit().await?, size))
}

/// Transcode the session video in place; returns the error text on failure
fn transcode_session(pipeline: &AnalysisPipeline, session: &SessionStore) -> Option<String> {
    let result = pipeline
        .transcode(&session.video_path(), &session.transcoded_path())
        .map_err(|e| e.to_string())
        .and_then(|()| session.promote_transcoded().map_err(|e| e.to_string()));

    match result {
        Ok(path) => {
            info!("Transcoded session video to {}", path.display());
            None
        }
        Err(e) => {
            warn!("Transcoding failed, analyzing the original upload: {}", e);
            session.discard_transcoded();
            Some(e)
        }
    }
}

fn render_targets(session: &SessionStore) -> RenderTargets {
    RenderTargets {
        plot: session.plot_path(),
        pie: Some(session.pie_path()),
    }
}

fn respond(
    state: &AppState,
    report: PipelineReport,
    message: &str,
) -> Result<AnalysisResponse, ApiError> {
    let config = state.session.config();
    let plot_url = format!("/plots/{}", config.plot_file);
    let pie_url = report.pie_path.as_ref().map(|_| format!("/plots/{}", config.pie_file));

    let record = AnalysisRecord {
        id: 0,
        analyzed_at: Utc::now(),
        source: report.source.display().to_string(),
        frames: report.frames,
        elapsed_seconds: report.elapsed_seconds,
        stats: report.analysis.stats.clone(),
        attention: report.analysis.attention,
        plot_file: config.plot_file.clone(),
        pie_file: pie_url.as_ref().map(|_| config.pie_file.clone()),
    };
    let analyzed_at = record.analyzed_at;
    let analysis_id = state.history.insert(record)?;

    Ok(AnalysisResponse {
        success: true,
        message: message.to_string(),
        filepath: None,
        plot_url,
        pie_url,
        stats: report.analysis.stats,
        attention: report.analysis.attention,
        frames: report.frames,
        analysis_id,
        analyzed_at,
        conversion_failed: None,
        conversion_error: None,
    })
}
