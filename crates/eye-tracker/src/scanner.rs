//! Multi-scale sliding-window detection
//!
//! Scans an image pyramid with a fixed-size patch classifier, then merges
//! overlapping hits. A candidate survives only when more than
//! `min_neighbors` raw hits fall into its group, which suppresses isolated
//! false positives the same way cascade detectors do.

use std::collections::BTreeMap;

use frame_capture::GrayFrame;
use tracing::trace;

use crate::config::ScanParams;
use crate::detector::{EyeDetector, FaceDetector, Region};
use crate::TrackerError;

/// Windows classified per batch
const BATCH_SIZE: usize = 256;

/// Relative tolerance when grouping overlapping hits
const GROUP_EPS: f32 = 0.2;

/// Scores fixed-size grayscale windows
pub trait PatchClassifier: Send + Sync {
    /// Window size the classifier expects (width, height)
    fn window(&self) -> (u32, u32);

    /// Probability that each patch contains the object
    fn classify(&self, patches: &[GrayFrame]) -> Result<Vec<f32>, TrackerError>;
}

/// Raw hit before grouping
#[derive(Debug, Clone, Copy)]
struct Hit {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    score: f32,
}

/// Detect-multi-scale driver around a [`PatchClassifier`]
pub struct MultiScaleScanner<C> {
    classifier: C,
    params: ScanParams,
}

impl<C: PatchClassifier> MultiScaleScanner<C> {
    pub fn new(classifier: C, params: ScanParams) -> Self {
        Self { classifier, params }
    }

    /// Find objects in `image`
    pub fn scan(&self, image: &GrayFrame) -> Result<Vec<Region>, TrackerError> {
        let (win_w, win_h) = self.classifier.window();
        if win_w == 0 || win_h == 0 {
            return Err(TrackerError::Config("classifier window must be non-zero".into()));
        }
        let min_side = self.params.min_size.max(win_w.min(win_h)) as f32;
        let step = self.params.stride.max(1) as usize;

        let mut hits = Vec::new();
        let mut scale = 1.0f32;

        let (img_w, img_h) = (image.width as f32, image.height as f32);
        let fits = |scale: f32| win_w as f32 * scale <= img_w && win_h as f32 * scale <= img_h;
        while fits(scale) {
            if (win_w.min(win_h) as f32 * scale) >= min_side {
                let scaled_w = (image.width as f32 / scale).round() as u32;
                let scaled_h = (image.height as f32 / scale).round() as u32;
                if scaled_w < win_w || scaled_h < win_h {
                    break;
                }
                let level = if scale == 1.0 {
                    image.clone()
                } else {
                    image.resize(scaled_w, scaled_h)
                };
                self.scan_level(&level, scale, step, &mut hits)?;
            }
            scale *= self.params.scale_factor;
        }

        trace!("{} raw hits before grouping", hits.len());
        Ok(group_hits(&hits, self.params.min_neighbors))
    }

    fn scan_level(
        &self,
        level: &GrayFrame,
        scale: f32,
        step: usize,
        hits: &mut Vec<Hit>,
    ) -> Result<(), TrackerError> {
        let (win_w, win_h) = self.classifier.window();
        let mut origins = Vec::with_capacity(BATCH_SIZE);
        let mut patches = Vec::with_capacity(BATCH_SIZE);

        for y in (0..=level.height - win_h).step_by(step) {
            for x in (0..=level.width - win_w).step_by(step) {
                if let Some(patch) = level.crop(x, y, win_w, win_h) {
                    origins.push((x, y));
                    patches.push(patch);
                }
                if patches.len() == BATCH_SIZE {
                    self.flush(&mut origins, &mut patches, scale, hits)?;
                }
            }
        }
        self.flush(&mut origins, &mut patches, scale, hits)
    }

    fn flush(
        &self,
        origins: &mut Vec<(u32, u32)>,
        patches: &mut Vec<GrayFrame>,
        scale: f32,
        hits: &mut Vec<Hit>,
    ) -> Result<(), TrackerError> {
        if patches.is_empty() {
            return Ok(());
        }
        let (win_w, win_h) = self.classifier.window();
        let scores = self.classifier.classify(patches)?;
        if scores.len() != patches.len() {
            return Err(TrackerError::Inference(format!(
                "classifier returned {} scores for {} patches",
                scores.len(),
                patches.len()
            )));
        }

        for (&(x, y), &score) in origins.iter().zip(&scores) {
            if score >= self.params.threshold {
                hits.push(Hit {
                    x: x as f32 * scale,
                    y: y as f32 * scale,
                    w: win_w as f32 * scale,
                    h: win_h as f32 * scale,
                    score,
                });
            }
        }
        origins.clear();
        patches.clear();
        Ok(())
    }
}

impl<C: PatchClassifier> FaceDetector for MultiScaleScanner<C> {
    fn detect_faces(&self, frame: &GrayFrame) -> Result<Vec<Region>, TrackerError> {
        self.scan(frame)
    }
}

impl<C: PatchClassifier> EyeDetector for MultiScaleScanner<C> {
    fn detect_eyes(&self, face: &GrayFrame) -> Result<Vec<Region>, TrackerError> {
        self.scan(face)
    }
}

fn similar(a: &Hit, b: &Hit) -> bool {
    let delta = GROUP_EPS * (a.w.min(b.w) + a.h.min(b.h)) * 0.5;
    (a.x - b.x).abs() <= delta
        && (a.y - b.y).abs() <= delta
        && (a.x + a.w - b.x - b.w).abs() <= delta
        && (a.y + a.h - b.y - b.h).abs() <= delta
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Partition hits into similarity classes and average each class
///
/// With `min_neighbors == 0` every raw hit is returned unmerged.
fn group_hits(hits: &[Hit], min_neighbors: u32) -> Vec<Region> {
    let to_region = |h: &Hit| {
        Region::new(
            h.x.round() as u32,
            h.y.round() as u32,
            h.w.round() as u32,
            h.h.round() as u32,
        )
        .with_confidence(h.score)
    };

    if min_neighbors == 0 {
        return hits.iter().map(to_region).collect();
    }

    let mut parent: Vec<usize> = (0..hits.len()).collect();
    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if similar(&hits[i], &hits[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // root -> (sum hit, count); BTreeMap keeps output order stable
    let mut classes: BTreeMap<usize, (Hit, u32)> = BTreeMap::new();
    for (i, hit) in hits.iter().enumerate() {
        let root = find(&mut parent, i);
        let entry = classes.entry(root).or_insert((
            Hit {
                x: 0.0,
                y: 0.0,
                w: 0.0,
                h: 0.0,
                score: 0.0,
            },
            0,
        ));
        entry.0.x += hit.x;
        entry.0.y += hit.y;
        entry.0.w += hit.w;
        entry.0.h += hit.h;
        entry.0.score += hit.score;
        entry.1 += 1;
    }

    classes
        .values()
        .filter(|(_, count)| *count > min_neighbors)
        .map(|(sum, count)| {
            let n = *count as f32;
            to_region(&Hit {
                x: sum.x / n,
                y: sum.y / n,
                w: sum.w / n,
                h: sum.h / n,
                score: sum.score / n,
            })
        })
        .collect()
}
