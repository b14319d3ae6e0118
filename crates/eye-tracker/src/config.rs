//! Eye tracker configuration

use serde::{Deserialize, Serialize};

use crate::detector::Region;
use crate::TrackerError;

/// Which face region drives eye detection when several are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSelection {
    /// Largest face by area
    #[default]
    Largest,
    /// First face in detector order
    First,
    /// Last face in detector order
    Last,
}

impl FaceSelection {
    pub fn select<'a>(&self, faces: &'a [Region]) -> Option<&'a Region> {
        match self {
            // max_by_key keeps the last of equal maxima; prefer the earlier one
            FaceSelection::Largest => faces
                .iter()
                .rev()
                .max_by_key(|face| face.area()),
            FaceSelection::First => faces.first(),
            FaceSelection::Last => faces.last(),
        }
    }
}

/// How elapsed capture time is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Wall-clock time from the first frame read until the source is exhausted
    #[default]
    WallClock,
    /// Time spanned by the frames' media timestamps
    Media,
}

/// Multi-scale scan parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Pyramid step between scales (> 1.0)
    pub scale_factor: f32,

    /// Overlapping hits a candidate needs beyond itself to be kept
    pub min_neighbors: u32,

    /// Smallest object side in pixels (0 = window size)
    pub min_size: u32,

    /// Classifier window width
    pub window_width: u32,

    /// Classifier window height
    pub window_height: u32,

    /// Window step in pixels at each scale
    pub stride: u32,

    /// Classifier score needed for a hit
    pub threshold: f32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self::face()
    }
}

impl ScanParams {
    /// Face scan defaults
    pub fn face() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 5,
            min_size: 0,
            window_width: 24,
            window_height: 24,
            stride: 2,
            threshold: 0.5,
        }
    }

    /// Eye scan defaults
    pub fn eye() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 10,
            min_size: 0,
            window_width: 20,
            window_height: 20,
            stride: 2,
            threshold: 0.5,
        }
    }

    pub fn window(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    fn validate(&self, name: &str) -> Result<(), TrackerError> {
        if !(self.scale_factor > 1.0) {
            return Err(TrackerError::Config(format!(
                "{} scale_factor must be greater than 1.0, got {}",
                name, self.scale_factor
            )));
        }
        if self.window_width == 0 || self.window_height == 0 || self.stride == 0 {
            return Err(TrackerError::Config(format!(
                "{} window and stride must be non-zero",
                name
            )));
        }
        Ok(())
    }
}

/// Eye tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Face patch classifier (ONNX); whole-frame fallback when unset
    pub face_model_path: Option<String>,

    /// Eye patch classifier (ONNX); dark-blob fallback when unset
    pub eye_model_path: Option<String>,

    pub face_scan: ScanParams,

    pub eye_scan: ScanParams,

    pub face_selection: FaceSelection,

    pub time_base: TimeBase,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            face_model_path: None,
            eye_model_path: None,
            face_scan: ScanParams::face(),
            eye_scan: ScanParams::eye(),
            face_selection: FaceSelection::Largest,
            time_base: TimeBase::WallClock,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.face_scan.validate("face_scan")?;
        self.eye_scan.validate("eye_scan")
    }
}
