//! Frame sampling into a binary detection sequence

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use frame_capture::{FrameSource, VideoFrame};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TimeBase;
use crate::detector::FrameDetection;
use crate::{EyeTracker, TrackerError};

/// One entry per frame, in frame order: `true` when eyes were found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionSample(Vec<bool>);

impl DetectionSample {
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Frames in which eyes were found
    pub fn positives(&self) -> usize {
        self.0.iter().filter(|&&v| v).count()
    }
}

impl From<Vec<bool>> for DetectionSample {
    fn from(values: Vec<bool>) -> Self {
        Self(values)
    }
}

/// Receives every sampled frame, e.g. for live display
pub trait FrameObserver {
    /// Return `ControlFlow::Break` to stop sampling after this frame
    fn on_frame(&mut self, frame: &VideoFrame, detection: &FrameDetection) -> ControlFlow<()>;
}

/// Result of sampling a source to exhaustion
#[derive(Debug, Clone)]
pub struct Capture {
    pub sample: DetectionSample,
    /// Capture duration according to the configured time base
    pub elapsed: Duration,
    /// Frames in which a face was selected
    pub frames_with_face: usize,
}

/// Runs the eye tracker over every frame of a source
pub struct FrameSampler {
    tracker: EyeTracker,
    time_base: TimeBase,
}

impl FrameSampler {
    pub fn new(tracker: EyeTracker, time_base: TimeBase) -> Self {
        Self { tracker, time_base }
    }

    /// Sample `source` until it is exhausted or the observer stops it
    ///
    /// A source that fails before yielding any frame is reported as
    /// [`TrackerError::SourceUnreadable`]; a failure after that ends the
    /// capture with the frames read so far.
    pub fn sample(
        &self,
        source: &mut dyn FrameSource,
        mut observer: Option<&mut dyn FrameObserver>,
    ) -> Result<Capture, TrackerError> {
        let started = Instant::now();
        let mut values = Vec::new();
        let mut frames_with_face = 0usize;
        let mut first_ts: Option<u64> = None;
        let mut last_ts = 0u64;

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if values.is_empty() => {
                    return Err(TrackerError::SourceUnreadable(e.to_string()));
                }
                Err(e) => {
                    warn!(
                        "Frame source failed after {} frames, ending capture: {}",
                        values.len(),
                        e
                    );
                    break;
                }
            };

            if !frame.is_well_formed() {
                return Err(TrackerError::ImageProcessing(format!(
                    "frame {} has {} bytes for {}x{}",
                    frame.sequence,
                    frame.data.len(),
                    frame.width,
                    frame.height
                )));
            }

            let gray = frame.to_grayscale();
            let detection = self.tracker.detect(&gray)?;
            if detection.face.is_some() {
                frames_with_face += 1;
            }
            values.push(detection.eyes_found());

            first_ts.get_or_insert(frame.timestamp_ns);
            last_ts = frame.timestamp_ns;

            if let Some(obs) = observer.as_deref_mut() {
                if obs.on_frame(&frame, &detection).is_break() {
                    debug!("Observer stopped sampling at frame {}", frame.sequence);
                    break;
                }
            }
        }

        let elapsed = match self.time_base {
            TimeBase::WallClock => started.elapsed(),
            TimeBase::Media => media_span(first_ts, last_ts, values.len()),
        };

        let sample = DetectionSample::from(values);
        info!(
            "Sampled {} frames ({} with face, {} with eyes) over {:.2}s",
            sample.len(),
            frames_with_face,
            sample.positives(),
            elapsed.as_secs_f64()
        );

        Ok(Capture {
            sample,
            elapsed,
            frames_with_face,
        })
    }
}

/// Duration covered by `frames` frames whose timestamps run from first to last
///
/// The last frame is counted as lasting one average frame interval.
fn media_span(first_ts: Option<u64>, last_ts: u64, frames: usize) -> Duration {
    let Some(first) = first_ts else {
        return Duration::ZERO;
    };
    if frames < 2 {
        return Duration::ZERO;
    }
    let span = last_ts.saturating_sub(first);
    let interval = span / (frames as u64 - 1);
    Duration::from_nanos(span + interval)
}
