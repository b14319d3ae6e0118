//! Annotated frame output

use std::ops::ControlFlow;
use std::path::PathBuf;

use frame_capture::VideoFrame;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::detector::{FrameDetection, Region};
use crate::sampler::FrameObserver;

const FACE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const EYE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Draws face (blue) and eye (green) boxes and writes every Nth frame as PNG
pub struct AnnotationWriter {
    dir: PathBuf,
    every: u32,
    frame_limit: Option<usize>,
    seen: usize,
    written: usize,
}

impl AnnotationWriter {
    pub fn new(dir: impl Into<PathBuf>, every: u32) -> Self {
        Self {
            dir: dir.into(),
            every: every.max(1),
            frame_limit: None,
            seen: 0,
            written: 0,
        }
    }

    /// Stop sampling after `limit` frames
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

fn to_rect(region: &Region) -> Option<Rect> {
    (region.width > 0 && region.height > 0)
        .then(|| Rect::at(region.x as i32, region.y as i32).of_size(region.width, region.height))
}

/// Draw detection boxes onto a copy of the frame
pub fn annotate(frame: &VideoFrame, detection: &FrameDetection) -> Option<image::RgbImage> {
    let mut img = frame.to_rgb_image()?;
    if let Some(rect) = detection.face.as_ref().and_then(to_rect) {
        draw_hollow_rect_mut(&mut img, rect, FACE_COLOR);
    }
    for rect in detection.eyes.iter().filter_map(to_rect) {
        draw_hollow_rect_mut(&mut img, rect, EYE_COLOR);
    }
    Some(img)
}

impl FrameObserver for AnnotationWriter {
    fn on_frame(&mut self, frame: &VideoFrame, detection: &FrameDetection) -> ControlFlow<()> {
        self.seen += 1;

        if frame.sequence % self.every == 0 {
            if let Some(img) = annotate(frame, detection) {
                let path = self.dir.join(format!("frame_{:06}.png", frame.sequence));
                match img.save(&path) {
                    Ok(()) => {
                        self.written += 1;
                        debug!("Wrote {}", path.display());
                    }
                    Err(e) => warn!("Failed to write annotated frame {}: {}", path.display(), e),
                }
            }
        }

        match self.frame_limit {
            Some(limit) if self.seen >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    }
}
