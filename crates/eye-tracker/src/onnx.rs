//! ONNX-backed patch classifier

use frame_capture::GrayFrame;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, error};

use crate::scanner::PatchClassifier;
use crate::TrackerError;

/// Binary window classifier loaded from an ONNX model
///
/// The model takes `N x 1 x H x W` luma in `[0, 1]` and returns either one
/// probability per window (`N` or `N x 1`) or two-class scores (`N x 2`), in
/// which case the last column is the positive class.
pub struct OnnxPatchClassifier {
    session: Session,
    window: (u32, u32),
}

impl OnnxPatchClassifier {
    pub fn load(path: &str, window: (u32, u32)) -> Result<Self, TrackerError> {
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load classifier {}: {}", path, e);
                TrackerError::ModelLoad(e.to_string())
            })?;

        Ok(Self { session, window })
    }
}

impl PatchClassifier for OnnxPatchClassifier {
    fn window(&self) -> (u32, u32) {
        self.window
    }

    fn classify(&self, patches: &[GrayFrame]) -> Result<Vec<f32>, TrackerError> {
        if patches.is_empty() {
            return Ok(Vec::new());
        }
        let (w, h) = (self.window.0 as usize, self.window.1 as usize);

        let mut input = Array4::<f32>::zeros((patches.len(), 1, h, w));
        for (n, patch) in patches.iter().enumerate() {
            if patch.width as usize != w || patch.height as usize != h {
                return Err(TrackerError::ImageProcessing(format!(
                    "patch {}x{} does not match window {}x{}",
                    patch.width, patch.height, w, h
                )));
            }
            for (i, &v) in patch.data.iter().enumerate() {
                input[[n, 0, i / w, i % w]] = v as f32 / 255.0;
            }
        }

        let outputs = self
            .session
            .run(ort::inputs![input].map_err(|e| TrackerError::Inference(e.to_string()))?)
            .map_err(|e| TrackerError::Inference(e.to_string()))?;

        let scores = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| TrackerError::Inference(e.to_string()))?;
        let flat: Vec<f32> = scores.iter().copied().collect();

        let per_patch = flat.len() / patches.len();
        if per_patch == 0 || flat.len() % patches.len() != 0 {
            return Err(TrackerError::Inference(format!(
                "unexpected output size {} for batch of {}",
                flat.len(),
                patches.len()
            )));
        }
        debug!("Classified {} windows ({} outputs each)", patches.len(), per_patch);

        Ok((0..patches.len())
            .map(|n| flat[n * per_patch + per_patch - 1])
            .collect())
    }
}
