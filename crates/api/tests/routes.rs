//! Router tests driving the axum service in-process

use std::path::Path;
use std::sync::Arc;

use api::{create_router, AnalysisPipeline, AppConfig, AppState, SharedState, VideoBackend};
use attention_engine::AnalysisConfig;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use eye_tracker::{
    EyeDetector, EyeTracker, FaceDetector, FaceSelection, FrameSampler, Region, TimeBase,
    TrackerError,
};
use frame_capture::{CaptureError, FrameSource, GrayFrame, MemorySource, VideoFrame};
use plot_render::{PlotConfig, PlotRenderer};
use serde_json::Value;
use storage::StorageConfig;
use tokio::sync::RwLock;
use tower::ServiceExt;

const BOUNDARY: &str = "attention-test-boundary";

/// Whole frame is the face; bright frames show eyes
struct BrightFrames;

impl FaceDetector for BrightFrames {
    fn detect_faces(&self, gray: &GrayFrame) -> Result<Vec<Region>, TrackerError> {
        Ok(vec![Region::new(0, 0, gray.width, gray.height)])
    }
}

impl EyeDetector for BrightFrames {
    fn detect_eyes(&self, face: &GrayFrame) -> Result<Vec<Region>, TrackerError> {
        Ok(if face.mean_luma() > 128.0 {
            vec![Region::new(0, 0, 2, 2)]
        } else {
            Vec::new()
        })
    }
}

enum Script {
    /// Bright/dark pattern, one frame per entry at 30 fps
    Frames(Vec<bool>),
    Unreadable,
}

struct ScriptedBackend {
    script: Script,
}

impl VideoBackend for ScriptedBackend {
    fn open(&self, _path: &Path) -> Result<Box<dyn FrameSource>, CaptureError> {
        match &self.script {
            Script::Frames(pattern) => {
                let frames = pattern
                    .iter()
                    .enumerate()
                    .map(|(i, &bright)| {
                        let v = if bright { 230 } else { 10 };
                        VideoFrame::filled(16, 16, [v, v, v], i as u64 * 33_333_334, i as u32)
                    })
                    .collect();
                Ok(Box::new(MemorySource::new(frames)))
            }
            Script::Unreadable => Err(CaptureError::Unreadable("moov atom not found".into())),
        }
    }

    fn transcode(&self, _input: &Path, _output: &Path) -> Result<(), CaptureError> {
        Err(CaptureError::Transcode("encoder libx264 not found".into()))
    }
}

fn app(dir: &Path, script: Script) -> Router {
    let config = AppConfig {
        storage: StorageConfig {
            videos_dir: dir.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    };

    let tracker = EyeTracker::new(
        Box::new(BrightFrames),
        Box::new(BrightFrames),
        FaceSelection::Largest,
    );
    let pipeline = AnalysisPipeline::new(
        Arc::new(ScriptedBackend { script }),
        FrameSampler::new(tracker, TimeBase::Media),
        AnalysisConfig::default(),
        PlotRenderer::new(PlotConfig::default()).unwrap(),
    );

    let state: SharedState = Arc::new(RwLock::new(AppState::new(&config, pipeline).unwrap()));
    create_router(state, dir, &config.server)
}

fn alternating(frames: usize) -> Script {
    Script::Frames((0..frames).map(|i| (i / 10) % 2 == 0).collect())
}

fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    let disposition =
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n");
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(b"Content-Type: video/webm\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn upload(uri: &str, field: &str, filename: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(multipart_body(field, filename, b"\x1a\x45\xdf\xa3 fake webm"))
        .unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_upload_without_video_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), alternating(60))
        .oneshot(upload("/upload_video", "file", "rec.webm"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "No video file provided");
}

#[tokio::test]
async fn test_upload_with_empty_filename_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), alternating(60))
        .oneshot(upload("/upload_video", "video", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "Empty filename");
    assert!(!dir.path().join("session.mp4").exists());
}

#[tokio::test]
async fn test_truncated_upload_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = format!("--{BOUNDARY}\r\n").into_bytes();
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"video\"; filename=\"rec.webm\"\r\n\r\n",
    );
    // Connection drops before the closing boundary
    body.extend_from_slice(&[0x1a; 4096]);
    let request = Request::builder()
        .method("POST")
        .uri("/upload_video")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();

    let response = app(dir.path(), alternating(60)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to read upload"));
    assert!(!dir.path().join("session.mp4").exists());
    assert!(!dir.path().join("session.mp4.part").exists());
}

#[tokio::test]
async fn test_non_multipart_request_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/upload_video")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app(dir.path(), alternating(60)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_analyzes_and_serves_plot() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), alternating(60));

    let response = app
        .clone()
        .oneshot(upload("/upload_video", "video", "rec.webm"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["plot_url"], "/plots/eye_tracking_plot.png");
    assert_eq!(body["pie_url"], "/plots/attention_pie.png");
    assert_eq!(body["frames"], 60);
    assert!(body["stats"]["data_count"].as_u64().unwrap() > 0);
    assert!(body["stats"]["x_range"].is_array());
    assert!(body.get("conversion_failed").is_none());
    assert!(dir.path().join("session.mp4").exists());

    let plot = app
        .oneshot(
            Request::builder()
                .uri("/plots/eye_tracking_plot.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(plot.status(), StatusCode::OK);
    assert_eq!(plot.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_failed_transcode_still_analyzes() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), alternating(60))
        .oneshot(upload("/upload_video?save_with_opencv=true", "video", "rec.webm"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["conversion_failed"], true);
    assert!(body["conversion_error"].as_str().unwrap().contains("libx264"));
    assert!(body["stats"]["data_count"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_upload_without_frames_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), Script::Frames(Vec::new()))
        .oneshot(upload("/upload_video", "video", "rec.webm"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json(response).await["error"], "No data to analyze");
}

#[tokio::test]
async fn test_unreadable_video_is_distinct_from_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), Script::Unreadable)
        .oneshot(upload("/upload_video", "video", "rec.webm"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = json(response).await["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("Could not read video"), "{error}");
}

#[tokio::test]
async fn test_analyze_latest_without_upload_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), alternating(60))
        .oneshot(Request::builder().uri("/analyze_latest").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["error"], "No video found for analysis");
}

#[tokio::test]
async fn test_analyze_latest_after_upload() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), alternating(90));

    let first = app
        .clone()
        .oneshot(upload("/upload_video", "video", "rec.webm"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = json(first).await;

    let again = app
        .clone()
        .oneshot(Request::builder().uri("/analyze_latest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::OK);
    let again = json(again).await;
    assert_eq!(again["message"], "Video analyzed successfully");
    assert_eq!(again["stats"], first["stats"]);
    assert_eq!(again["analysis_id"], 2);

    let health = app
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let health = json(health).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["session"]["has_video"], true);
    assert_eq!(health["session"]["analyses"], 2);
    let recent = health["session"]["recent"].as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["id"], 2);
    assert_eq!(recent[1]["id"], 1);
    assert_eq!(recent[0]["data_count"], first["stats"]["data_count"]);
    let ratio = recent[0]["paying_ratio"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&ratio));
}

#[tokio::test]
async fn test_chat_requires_messages_and_key() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), alternating(10));

    let empty = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/openai")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"messages": []}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(empty).await["error"], "No messages provided");

    // AppConfig::default() carries no API key
    let no_key = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/openai")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"messages": [{"role": "user", "content": "hi"}]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(no_key.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(no_key).await["error"], "API key not configured");
}

#[tokio::test]
async fn test_missing_plot_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path(), alternating(10))
        .oneshot(Request::builder().uri("/plots/nothing.png").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
