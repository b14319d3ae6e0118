//! In-process video decoding using `ffmpeg-next`.

use ffmpeg_next as ffmpeg;
use std::path::Path;
use tracing::info;

use crate::{CaptureError, FrameSource, VideoFrame};

pub struct FfmpegFileSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u32,
    eof_sent: bool,
}

impl FfmpegFileSource {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        ffmpeg::init().map_err(|e| CaptureError::BackendUnavailable(e.to_string()))?;
        let input = ffmpeg::format::input(&path).map_err(|e| {
            let msg = format!("failed to open '{}' with ffmpeg: {}", path.display(), e);
            CaptureError::Unreadable(msg)
        })?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| CaptureError::Unreadable("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let time_base = input_stream.time_base();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| {
                CaptureError::Unreadable(format!("load video decoder parameters: {}", e))
            })?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| CaptureError::Unreadable(format!("open ffmpeg video decoder: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| CaptureError::Format(format!("create ffmpeg scaler: {}", e)))?;

        info!("Decoding {} in-process ({}x{})", path.display(), decoder.width(), decoder.height());

        Ok(Self {
            input,
            stream_index,
            time_base,
            decoder,
            scaler,
            frame_count: 0,
            eof_sent: false,
        })
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<VideoFrame, CaptureError> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Stream(format!("scale frame to RGB: {}", e)))?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;

        let timestamp_ns = decoded
            .timestamp()
            .map(|ts| {
                let num = self.time_base.numerator() as f64;
                let den = self.time_base.denominator().max(1) as f64;
                (ts.max(0) as f64 * num / den * 1e9) as u64
            })
            .unwrap_or(0);

        let sequence = self.frame_count;
        self.frame_count += 1;
        Ok(VideoFrame::new(pixels, width, height, timestamp_ns, sequence))
    }
}

impl FrameSource for FfmpegFileSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        let stream_index = self.stream_index;

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let next = self
                .input
                .packets()
                .find(|(stream, _)| stream.index() == stream_index);

            match next {
                Some((_, packet)) => self
                    .decoder
                    .send_packet(&packet)
                    .map_err(|e| CaptureError::Stream(format!("send packet to decoder: {}", e)))?,
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| CaptureError::Stream(format!("flush decoder: {}", e)))?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32), CaptureError> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        let row = data
            .get(start..end)
            .ok_or_else(|| CaptureError::Format("ffmpeg frame row is out of bounds".to_string()))?;
        pixels.extend_from_slice(row);
    }

    Ok((pixels, width, height))
}
