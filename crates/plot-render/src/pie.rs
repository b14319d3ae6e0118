//! Two-slice attention pie chart

use std::f64::consts::TAU;

use image::{Rgb, RgbImage};

use attention_engine::AttentionBreakdown;

use crate::canvas::WHITE;

pub const PAYING_COLOR: Rgb<u8> = Rgb([198, 219, 239]);
pub const NOT_PAYING_COLOR: Rgb<u8> = Rgb([66, 146, 198]);

/// Centre and radius of the pie in pixel space
#[derive(Debug, Clone, Copy)]
pub struct PieGeometry {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl PieGeometry {
    /// Pixel position `scale * radius` from the centre along `angle`
    pub fn along(&self, angle: f64, scale: f64) -> (i32, i32) {
        let r = self.radius * scale;
        (
            (self.cx + r * angle.cos()).round() as i32,
            (self.cy - r * angle.sin()).round() as i32,
        )
    }
}

/// Angle where the "paying attention" slice ends
fn split_angle(breakdown: &AttentionBreakdown) -> f64 {
    TAU * breakdown.paying_ratio()
}

/// Mid-angles of the paying and not-paying slices
pub fn mid_angles(breakdown: &AttentionBreakdown) -> (f64, f64) {
    let split = split_angle(breakdown);
    (split / 2.0, (split + TAU) / 2.0)
}

/// Fill the pie, slices counter-clockwise from three o'clock
///
/// Slice borders within `edge` pixels are left white.
pub fn draw_pie(
    img: &mut RgbImage,
    geometry: &PieGeometry,
    breakdown: &AttentionBreakdown,
    edge: f64,
) {
    if breakdown.total() == 0 {
        return;
    }

    let PieGeometry { cx, cy, radius } = *geometry;
    let split = split_angle(breakdown);
    let single_slice = breakdown.paying_attention == 0 || breakdown.not_paying_attention == 0;

    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 + 0.5 - cx;
            // Image rows grow downwards; flip for counter-clockwise angles
            let dy = cy - (y as f64 + 0.5);
            let dist = (dx * dx + dy * dy).sqrt();
            if dist > radius {
                continue;
            }

            let angle = dy.atan2(dx).rem_euclid(TAU);
            if !single_slice && near_border(angle, split, dist, edge) {
                img.put_pixel(x, y, WHITE);
                continue;
            }
            let color = if angle < split { PAYING_COLOR } else { NOT_PAYING_COLOR };
            img.put_pixel(x, y, color);
        }
    }
}

/// Whether a point lies within `edge` pixels of either slice boundary ray
fn near_border(angle: f64, split: f64, dist: f64, edge: f64) -> bool {
    let to_ray = |ray: f64| {
        let delta = (angle - ray).rem_euclid(TAU);
        let delta = delta.min(TAU - delta);
        if delta > TAU / 4.0 {
            f64::MAX
        } else {
            dist * delta.sin()
        }
    };
    to_ray(0.0) < edge || to_ray(split) < edge
}
