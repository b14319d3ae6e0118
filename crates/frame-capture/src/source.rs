//! Frame sources

use std::collections::VecDeque;

use crate::{CaptureError, VideoFrame};

/// A readable sequence of frames
///
/// `Ok(None)` signals that the source is exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        (**self).next_frame()
    }
}

/// Replays frames held in memory
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<VideoFrame>,
}

impl MemorySource {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Frames not yet handed out
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        Ok(self.frames.pop_front())
    }
}
