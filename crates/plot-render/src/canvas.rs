//! Plot area mapping and line primitives

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GRID: Rgb<u8> = Rgb([220, 220, 220]);
pub const RAW_BLUE: Rgb<u8> = Rgb([31, 119, 180]);
pub const TREND_RED: Rgb<u8> = Rgb([214, 39, 40]);
pub const AVERAGE_GREEN: Rgb<u8> = Rgb([44, 160, 44]);

/// Data-space rectangle mapped onto a pixel rectangle
#[derive(Debug, Clone, Copy)]
pub struct PlotArea {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl PlotArea {
    pub fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        let x_span = (self.x_max - self.x_min).max(f64::EPSILON);
        let y_span = (self.y_max - self.y_min).max(f64::EPSILON);
        let px = self.left as f64 + (x - self.x_min) / x_span * self.width as f64;
        let py = self.top as f64 + (self.y_max - y) / y_span * self.height as f64;
        (px as f32, py as f32)
    }

    /// Clamp a pixel to the area so lines stay inside the frame
    fn clamp(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            x.clamp(self.left as f32, (self.left + self.width) as f32),
            y.clamp(self.top as f32, (self.top + self.height) as f32),
        )
    }

    pub fn draw_frame(&self, img: &mut RgbImage) {
        let rect = Rect::at(self.left as i32, self.top as i32)
            .of_size(self.width + 1, self.height + 1);
        draw_hollow_rect_mut(img, rect, BLACK);
    }

    /// Light grid lines at `divisions` even steps in both directions
    pub fn draw_grid(&self, img: &mut RgbImage, divisions: u32) {
        if divisions == 0 {
            return;
        }
        let (left, top) = (self.left as f32, self.top as f32);
        let (right, bottom) = ((self.left + self.width) as f32, (self.top + self.height) as f32);
        for i in 1..divisions {
            let x = left + self.width as f32 * i as f32 / divisions as f32;
            draw_line_segment_mut(img, (x, top), (x, bottom), GRID);
            let y = top + self.height as f32 * i as f32 / divisions as f32;
            draw_line_segment_mut(img, (left, y), (right, y), GRID);
        }
        // Tick marks on the axes
        for i in 0..=divisions {
            let x = self.left as f32 + self.width as f32 * i as f32 / divisions as f32;
            let bottom = (self.top + self.height) as f32;
            draw_line_segment_mut(img, (x, bottom), (x, bottom + 5.0), BLACK);
            let y = self.top as f32 + self.height as f32 * i as f32 / divisions as f32;
            draw_line_segment_mut(img, (self.left as f32 - 5.0, y), (self.left as f32, y), BLACK);
        }
    }

    pub fn draw_polyline(
        &self,
        img: &mut RgbImage,
        points: &[(f64, f64)],
        color: Rgb<u8>,
        thickness: u32,
    ) {
        for pair in points.windows(2) {
            let start = self.clamp(self.to_pixel(pair[0].0, pair[0].1));
            let end = self.clamp(self.to_pixel(pair[1].0, pair[1].1));
            thick_segment(img, start, end, color, thickness);
        }
    }

    pub fn draw_dashed(
        &self,
        img: &mut RgbImage,
        from: (f64, f64),
        to: (f64, f64),
        color: Rgb<u8>,
        dash: f32,
        thickness: u32,
    ) {
        let start = self.clamp(self.to_pixel(from.0, from.1));
        let end = self.clamp(self.to_pixel(to.0, to.1));
        let length = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();
        if length < 1.0 || dash <= 0.0 {
            thick_segment(img, start, end, color, thickness);
            return;
        }

        let (dx, dy) = ((end.0 - start.0) / length, (end.1 - start.1) / length);
        let mut offset = 0.0;
        while offset < length {
            let stop = (offset + dash).min(length);
            let a = (start.0 + dx * offset, start.1 + dy * offset);
            let b = (start.0 + dx * stop, start.1 + dy * stop);
            thick_segment(img, a, b, color, thickness);
            offset += dash * 2.0;
        }
    }

    pub fn draw_markers(
        &self,
        img: &mut RgbImage,
        points: &[(f64, f64)],
        color: Rgb<u8>,
        radius: i32,
    ) {
        for &(x, y) in points {
            let (px, py) = self.to_pixel(x, y);
            draw_filled_circle_mut(img, (px.round() as i32, py.round() as i32), radius, color);
        }
    }
}

fn thick_segment(
    img: &mut RgbImage,
    start: (f32, f32),
    end: (f32, f32),
    color: Rgb<u8>,
    thickness: u32,
) {
    let spread = thickness.max(1) as i32 / 2;
    for o in -spread..=spread {
        let o = o as f32;
        draw_line_segment_mut(img, (start.0, start.1 + o), (end.0, end.1 + o), color);
    }
}
