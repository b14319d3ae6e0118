//! Frame Capture Library for Attention Monitoring
//!
//! Turns recorded video into a stream of RGB frames for eye tracking.
//! Supports:
//! - ffmpeg subprocess decoding (default, needs `ffmpeg`/`ffprobe` on PATH)
//! - in-process decoding through `ffmpeg-next` (`ffmpeg-native` feature)
//! - in-memory frame replay for tests and synthetic input
//! - best-effort transcoding of uploads to H.264 MP4

pub mod ffmpeg;
#[cfg(feature = "ffmpeg-native")]
pub mod ffmpeg_native;
pub mod frame;
pub mod source;
pub mod transcode;

pub use ffmpeg::{probe, FfmpegProcessSource, VideoInfo};
pub use frame::{GrayFrame, VideoFrame};
pub use source::{FrameSource, MemorySource};
pub use transcode::transcode_to_mp4;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Capture error types
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The source could not be opened or contains no decodable video
    #[error("Video source unreadable: {0}")]
    Unreadable(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Capture backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Transcoding failed: {0}")]
    Transcode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureBackend {
    /// Spawn `ffmpeg` and read raw RGB24 frames from its stdout
    #[default]
    Process,
    /// Decode in-process with `ffmpeg-next`
    Native,
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Decoder backend
    pub backend: CaptureBackend,
    /// `ffmpeg` executable
    pub ffmpeg_path: String,
    /// `ffprobe` executable
    pub ffprobe_path: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::Process,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// Open a video file with the configured backend
pub fn open_video(
    path: &Path,
    config: &CaptureConfig,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    if !path.is_file() {
        return Err(CaptureError::Unreadable(format!(
            "{} does not exist or is not a file",
            path.display()
        )));
    }

    debug!("Opening {} with {:?} backend", path.display(), config.backend);
    match config.backend {
        CaptureBackend::Process => Ok(Box::new(FfmpegProcessSource::open(path, config)?)),
        CaptureBackend::Native => {
            #[cfg(feature = "ffmpeg-native")]
            {
                Ok(Box::new(ffmpeg_native::FfmpegFileSource::open(path)?))
            }
            #[cfg(not(feature = "ffmpeg-native"))]
            {
                Err(CaptureError::BackendUnavailable(
                    "native decoding requires the ffmpeg-native feature".to_string(),
                ))
            }
        }
    }
}
