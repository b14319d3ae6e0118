//! Video decoding through an `ffmpeg` child process
//!
//! The file is probed with `ffprobe` for its dimensions and frame rate, then
//! `ffmpeg` decodes it to raw RGB24 on stdout, one `width * height * 3` chunk
//! per frame.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{CaptureConfig, CaptureError, FrameSource, VideoFrame};

/// Frame rate assumed when the container does not declare one
const FALLBACK_FPS: f64 = 30.0;

/// Stream properties reported by `ffprobe`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe the first video stream of a file
pub fn probe(ffprobe: &str, path: &Path) -> Result<VideoInfo, CaptureError> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
        .arg("stream=width,height,r_frame_rate,avg_frame_rate")
        .args(["-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            CaptureError::BackendUnavailable(format!("failed to run {}: {}", ffprobe, e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::Unreadable(format!(
            "ffprobe rejected {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(raw: &[u8]) -> Result<VideoInfo, CaptureError> {
    let parsed: ProbeOutput = serde_json::from_slice(raw)
        .map_err(|e| CaptureError::Unreadable(format!("unparseable probe output: {}", e)))?;

    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| CaptureError::Unreadable("file has no video track".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(CaptureError::Unreadable("video track has no dimensions".to_string())),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(FALLBACK_FPS);

    Ok(VideoInfo { width, height, fps })
}

/// Parse an ffprobe rational such as `30000/1001`
fn parse_frame_rate(value: &str) -> Option<f64> {
    let (num, den) = match value.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (value.trim().parse::<f64>().ok()?, 1.0),
    };
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Frame source backed by an `ffmpeg` child process
pub struct FfmpegProcessSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    frame_len: usize,
    frames_read: u32,
    finished: bool,
}

impl FfmpegProcessSource {
    /// Probe and start decoding `path`
    pub fn open(path: &Path, config: &CaptureConfig) -> Result<Self, CaptureError> {
        let info = probe(&config.ffprobe_path, path)?;

        let mut child = Command::new(&config.ffmpeg_path)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                let msg = format!("failed to run {}: {}", config.ffmpeg_path, e);
                CaptureError::BackendUnavailable(msg)
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Stream("ffmpeg stdout not captured".to_string()))?;

        // ffmpeg stalls once the stderr pipe fills, so drain it on a side thread
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        info!(
            "Decoding {} ({}x{} @ {:.2} fps) via ffmpeg",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        Ok(Self {
            frame_len: info.width as usize * info.height as usize * 3,
            info,
            child,
            stdout,
            stderr,
            frames_read: 0,
            finished: false,
        })
    }

    /// Fill `buf` completely; returns the number of bytes read before EOF
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CaptureError::Io(e)),
            }
        }
        Ok(filled)
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        self.finished = true;
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            debug!("ffmpeg finished after {} frames", self.frames_read);
            return Ok(());
        }

        let message = format!("ffmpeg exited with {}: {}", status, stderr.trim());
        if self.frames_read == 0 {
            Err(CaptureError::Unreadable(message))
        } else {
            Err(CaptureError::Stream(message))
        }
    }
}

impl FrameSource for FfmpegProcessSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        if self.finished {
            return Ok(None);
        }

        let mut data = vec![0u8; self.frame_len];
        let filled = self.read_chunk(&mut data)?;

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < self.frame_len {
            warn!("Truncated frame: {} of {} bytes", filled, self.frame_len);
            self.finish()?;
            return Ok(None);
        }

        let sequence = self.frames_read;
        self.frames_read += 1;
        let timestamp_ns = (sequence as f64 / self.info.fps * 1e9) as u64;

        Ok(Some(VideoFrame::new(
            data,
            self.info.width,
            self.info.height,
            timestamp_ns,
            sequence,
        )))
    }
}

impl Drop for FfmpegProcessSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
