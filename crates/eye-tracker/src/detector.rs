//! Face and eye detectors

use frame_capture::GrayFrame;
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};

use crate::TrackerError;

/// Axis-aligned bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Detector score, 1.0 for model-free detectors
    pub confidence: f32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Translate by a parent region's origin
    pub fn offset(self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    /// Shrink the region so it lies inside a `width` x `height` frame
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
            confidence: self.confidence,
        }
    }
}

/// Finds face regions in a grayscale frame
pub trait FaceDetector: Send + Sync {
    fn detect_faces(&self, frame: &GrayFrame) -> Result<Vec<Region>, TrackerError>;
}

/// Finds eye regions inside a grayscale face crop
///
/// Returned regions are relative to the crop.
pub trait EyeDetector: Send + Sync {
    fn detect_eyes(&self, face: &GrayFrame) -> Result<Vec<Region>, TrackerError>;
}

/// Detection result for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameDetection {
    /// Every face the detector reported
    pub faces: Vec<Region>,

    /// Face selected for eye detection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face: Option<Region>,

    /// Eyes inside the selected face, in frame coordinates
    pub eyes: Vec<Region>,
}

impl FrameDetection {
    /// The per-frame attention signal
    pub fn eyes_found(&self) -> bool {
        !self.eyes.is_empty()
    }
}

/// Treats the whole frame as the face region unless the frame is blank
///
/// Used when no face model is configured; a covered lens or blown-out frame
/// yields no face.
#[derive(Debug, Clone)]
pub struct WholeFrameFaceDetector {
    /// Frames with mean luma below this are considered dark
    pub min_mean_luma: f32,
    /// Frames with mean luma above this are considered washed out
    pub max_mean_luma: f32,
}

impl Default for WholeFrameFaceDetector {
    fn default() -> Self {
        Self {
            min_mean_luma: 16.0,
            max_mean_luma: 240.0,
        }
    }
}

impl FaceDetector for WholeFrameFaceDetector {
    fn detect_faces(&self, frame: &GrayFrame) -> Result<Vec<Region>, TrackerError> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(Vec::new());
        }
        let mean = frame.mean_luma();
        if mean < self.min_mean_luma || mean > self.max_mean_luma {
            return Ok(Vec::new());
        }
        Ok(vec![Region::new(0, 0, frame.width, frame.height)])
    }
}

/// Looks for dark, eye-sized blobs in the upper band of the face
#[derive(Debug, Clone)]
pub struct DarkBlobEyeDetector {
    /// Eye band as fractions of face height (top, bottom)
    pub band: (f32, f32),
    /// Minimum luma spread in the band before thresholding
    pub min_contrast: u8,
    /// Blob area bounds as fractions of the band area
    pub min_area_ratio: f32,
    pub max_area_ratio: f32,
    /// Blob width / height bounds
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl Default for DarkBlobEyeDetector {
    fn default() -> Self {
        Self {
            band: (0.15, 0.55),
            min_contrast: 40,
            min_area_ratio: 0.002,
            max_area_ratio: 0.08,
            min_aspect: 0.5,
            max_aspect: 4.0,
        }
    }
}

impl EyeDetector for DarkBlobEyeDetector {
    fn detect_eyes(&self, face: &GrayFrame) -> Result<Vec<Region>, TrackerError> {
        let top = (face.height as f32 * self.band.0) as u32;
        let bottom = ((face.height as f32 * self.band.1) as u32).min(face.height);
        if bottom <= top || face.width == 0 {
            return Ok(Vec::new());
        }

        let band = face
            .crop(0, top, face.width, bottom - top)
            .and_then(|b| b.to_image())
            .ok_or_else(|| TrackerError::ImageProcessing("eye band outside face crop".into()))?;

        let (lo, hi) = band
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        if hi.saturating_sub(lo) < self.min_contrast {
            return Ok(Vec::new());
        }

        let level = otsu_level(&band);
        let binary = GrayImage::from_fn(band.width(), band.height(), |x, y| {
            if band.get_pixel(x, y)[0] <= level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        // label -> (min_x, min_y, max_x, max_y, pixel count)
        let mut boxes: std::collections::BTreeMap<u32, (u32, u32, u32, u32, u32)> =
            std::collections::BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            if label[0] == 0 {
                continue;
            }
            let entry = boxes.entry(label[0]).or_insert((x, y, x, y, 0));
            entry.0 = entry.0.min(x);
            entry.1 = entry.1.min(y);
            entry.2 = entry.2.max(x);
            entry.3 = entry.3.max(y);
            entry.4 += 1;
        }

        let band_area = (band.width() * band.height()) as f32;
        let eyes = boxes
            .values()
            .filter_map(|&(x0, y0, x1, y1, count)| {
                let w = x1 - x0 + 1;
                let h = y1 - y0 + 1;
                let ratio = count as f32 / band_area;
                let aspect = w as f32 / h as f32;
                let plausible = ratio >= self.min_area_ratio
                    && ratio <= self.max_area_ratio
                    && aspect >= self.min_aspect
                    && aspect <= self.max_aspect;
                plausible.then(|| Region::new(x0, y0 + top, w, h))
            })
            .collect();

        Ok(eyes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mid-gray face with two dark squares in the eye band
    fn face_with_eyes(size: u32) -> GrayFrame {
        let mut data = vec![150u8; (size * size) as usize];
        let eye = size / 10;
        let row = size * 3 / 10;
        for &col in &[size * 3 / 10, size * 6 / 10] {
            for y in row..row + eye {
                for x in col..col + eye {
                    data[(y * size + x) as usize] = 20;
                }
            }
        }
        GrayFrame::new(data, size, size)
    }

    #[test]
    fn test_region_clamp_and_offset() {
        let region = Region::new(8, 8, 10, 10).clamp_to(12, 20);
        assert_eq!((region.x, region.width, region.height), (8, 4, 10));
        let moved = Region::new(1, 2, 3, 4).offset(10, 20);
        assert_eq!((moved.x, moved.y), (11, 22));
        assert_eq!(Region::new(30, 30, 5, 5).clamp_to(20, 20).area(), 0);
    }

    #[test]
    fn test_whole_frame_face_rejects_blank_frames() {
        let detector = WholeFrameFaceDetector::default();
        let dark = GrayFrame::new(vec![2; 100], 10, 10);
        let normal = GrayFrame::new(vec![120; 100], 10, 10);
        assert!(detector.detect_faces(&dark).unwrap().is_empty());
        assert_eq!(detector.detect_faces(&normal).unwrap().len(), 1);
    }

    #[test]
    fn test_dark_blobs_found_in_eye_band() {
        let eyes = DarkBlobEyeDetector::default()
            .detect_eyes(&face_with_eyes(100))
            .unwrap();
        assert_eq!(eyes.len(), 2);
        for eye in &eyes {
            assert_eq!((eye.width, eye.height), (10, 10));
            assert_eq!(eye.y, 30);
        }
    }

    #[test]
    fn test_uniform_face_has_no_eyes() {
        let face = GrayFrame::new(vec![150; 10_000], 100, 100);
        assert!(DarkBlobEyeDetector::default().detect_eyes(&face).unwrap().is_empty());
    }

    #[test]
    fn test_tiny_face_has_no_band() {
        let face = GrayFrame::new(vec![150; 2], 2, 1);
        assert!(DarkBlobEyeDetector::default().detect_eyes(&face).unwrap().is_empty());
    }
}
