//! Eye Tracker
//!
//! Per-frame eye visibility detection for attention analysis:
//! - Face detection on the grayscale frame
//! - Selection of one face region per frame
//! - Eye detection inside the selected face region
//! - Frame sampling into a binary detection sequence

pub mod annotate;
pub mod config;
pub mod detector;
pub mod onnx;
pub mod sampler;
pub mod scanner;

pub use annotate::AnnotationWriter;
pub use config::{FaceSelection, ScanParams, TimeBase, TrackerConfig};
pub use detector::{
    DarkBlobEyeDetector, EyeDetector, FaceDetector, FrameDetection, Region, WholeFrameFaceDetector,
};
pub use onnx::OnnxPatchClassifier;
pub use sampler::{Capture, DetectionSample, FrameObserver, FrameSampler};
pub use scanner::{MultiScaleScanner, PatchClassifier};

use frame_capture::{CaptureError, GrayFrame};
use thiserror::Error;
use tracing::{info, warn};

/// Eye tracker error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// The source produced no frame at all before failing
    #[error("Video source unreadable: {0}")]
    SourceUnreadable(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Two-stage face then eye detector
pub struct EyeTracker {
    face_detector: Box<dyn FaceDetector>,
    eye_detector: Box<dyn EyeDetector>,
    face_selection: FaceSelection,
}

impl EyeTracker {
    /// Assemble a tracker from explicit detectors
    pub fn new(
        face_detector: Box<dyn FaceDetector>,
        eye_detector: Box<dyn EyeDetector>,
        face_selection: FaceSelection,
    ) -> Self {
        Self {
            face_detector,
            eye_detector,
            face_selection,
        }
    }

    /// Build detectors from configuration
    ///
    /// Configured model paths load ONNX patch classifiers driven by the
    /// multi-scale scanner; without models the model-free fallbacks are used.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;

        let face_detector: Box<dyn FaceDetector> = match &config.face_model_path {
            Some(path) => {
                info!("Loading face classifier from {}", path);
                let classifier = OnnxPatchClassifier::load(path, config.face_scan.window())?;
                Box::new(MultiScaleScanner::new(classifier, config.face_scan.clone()))
            }
            None => {
                warn!("No face model path configured. Using whole-frame face region.");
                Box::new(WholeFrameFaceDetector::default())
            }
        };

        let eye_detector: Box<dyn EyeDetector> = match &config.eye_model_path {
            Some(path) => {
                info!("Loading eye classifier from {}", path);
                let classifier = OnnxPatchClassifier::load(path, config.eye_scan.window())?;
                Box::new(MultiScaleScanner::new(classifier, config.eye_scan.clone()))
            }
            None => {
                warn!("No eye model path configured. Using dark-blob heuristic.");
                Box::new(DarkBlobEyeDetector::default())
            }
        };

        Ok(Self::new(face_detector, eye_detector, config.face_selection))
    }

    /// Detect the face and eyes in one grayscale frame
    pub fn detect(&self, gray: &GrayFrame) -> Result<FrameDetection, TrackerError> {
        let faces = self.face_detector.detect_faces(gray)?;

        let Some(face) = self.face_selection.select(&faces) else {
            return Ok(FrameDetection {
                faces,
                face: None,
                eyes: Vec::new(),
            });
        };

        let face = face.clamp_to(gray.width, gray.height);
        let eyes = match gray.crop(face.x, face.y, face.width, face.height) {
            Some(roi) => self
                .eye_detector
                .detect_eyes(&roi)?
                .into_iter()
                .map(|eye| eye.offset(face.x, face.y))
                .collect(),
            None => Vec::new(),
        };

        Ok(FrameDetection {
            faces,
            face: Some(face),
            eyes,
        })
    }
}
