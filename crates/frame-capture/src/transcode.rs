//! Best-effort transcoding to H.264 MP4

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{info, warn};

use crate::CaptureError;

/// Transcode `input` into a browser-playable MP4 at `output`
///
/// Errors carry the encoder's stderr so callers can surface it verbatim.
pub fn transcode_to_mp4(ffmpeg: &str, input: &Path, output: &Path) -> Result<(), CaptureError> {
    info!("Transcoding {} -> {}", input.display(), output.display());

    let result = Command::new(ffmpeg)
        .args(["-y", "-v", "error", "-nostdin", "-i"])
        .arg(input)
        .args(["-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p", "-an"])
        .arg(output)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| CaptureError::Transcode(format!("failed to run {}: {}", ffmpeg, e)))?;

    if result.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
    warn!("Transcoding failed ({}): {}", result.status, stderr);
    Err(CaptureError::Transcode(if stderr.is_empty() {
        format!("{} exited with {}", ffmpeg, result.status)
    } else {
        stderr
    }))
}
