//! Text drawing with the embedded DejaVu Sans face

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::canvas::WHITE;

static DEJAVU_SANS: &[u8] = include_bytes!("../fonts/DejaVuSans.ttf");

/// Horizontal placement of a label relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone)]
pub struct Typeface {
    font: FontRef<'static>,
}

impl Typeface {
    pub fn load() -> Result<Self, InvalidFont> {
        FontRef::try_from_slice(DEJAVU_SANS).map(|font| Self { font })
    }

    /// Pixel width and height of `text` at `size`
    pub fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        text_size(PxScale::from(size), &self.font, text)
    }

    /// Draw `text` vertically centred on `y`, aligned on `x`
    pub fn draw(
        &self,
        img: &mut RgbImage,
        text: &str,
        (x, y): (i32, i32),
        size: f32,
        color: Rgb<u8>,
        align: Align,
    ) {
        let (w, h) = self.measure(text, size);
        let left = match align {
            Align::Left => x,
            Align::Center => x - w as i32 / 2,
            Align::Right => x - w as i32,
        };
        draw_text_mut(img, color, left, y - h as i32 / 2, PxScale::from(size), &self.font, text);
    }

    /// Draw `text` rotated to read bottom-to-top, centred on `center`
    pub fn draw_vertical(
        &self,
        img: &mut RgbImage,
        text: &str,
        center: (i32, i32),
        size: f32,
        color: Rgb<u8>,
    ) {
        let (w, h) = self.measure(text, size);
        let mut strip = RgbImage::from_pixel(w + 4, h + 4, WHITE);
        draw_text_mut(&mut strip, color, 2, 2, PxScale::from(size), &self.font, text);
        let rotated = imageops::rotate270(&strip);

        let left = center.0 - rotated.width() as i32 / 2;
        let top = center.1 - rotated.height() as i32 / 2;
        for (sx, sy, pixel) in rotated.enumerate_pixels() {
            if *pixel == WHITE {
                continue;
            }
            let (dx, dy) = (left + sx as i32, top + sy as i32);
            if dx >= 0 && dy >= 0 && (dx as u32) < img.width() && (dy as u32) < img.height() {
                img.put_pixel(dx as u32, dy as u32, *pixel);
            }
        }
    }
}

/// Whether any pixel inside the rectangle is darker than mid-grey
#[cfg(test)]
pub(crate) fn has_ink(img: &RgbImage, x: std::ops::Range<u32>, y: std::ops::Range<u32>) -> bool {
    y.flat_map(|py| x.clone().map(move |px| (px, py)))
        .any(|(px, py)| img.get_pixel(px, py).0.iter().all(|&c| c < 128))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BLACK;

    #[test]
    fn test_embedded_font_loads_and_measures() {
        let face = Typeface::load().unwrap();
        let (short, h) = face.measure("0.5", 14.0);
        let (long, _) = face.measure("Eye Detection Score", 14.0);
        assert!(h > 0);
        assert!(long > short);
    }

    #[test]
    fn test_alignment_moves_ink() {
        let face = Typeface::load().unwrap();
        let mut left = RgbImage::from_pixel(200, 40, WHITE);
        face.draw(&mut left, "Time", (100, 20), 16.0, BLACK, Align::Left);
        assert!(has_ink(&left, 100..200, 0..40));
        assert!(!has_ink(&left, 0..100, 0..40));

        let mut right = RgbImage::from_pixel(200, 40, WHITE);
        face.draw(&mut right, "Time", (100, 20), 16.0, BLACK, Align::Right);
        assert!(has_ink(&right, 0..100, 0..40));
        assert!(!has_ink(&right, 100..200, 0..40));
    }

    #[test]
    fn test_vertical_text_is_taller_than_wide() {
        let face = Typeface::load().unwrap();
        let mut img = RgbImage::from_pixel(40, 200, WHITE);
        face.draw_vertical(&mut img, "Eye Detection", (20, 100), 14.0, BLACK);
        assert!(has_ink(&img, 0..40, 40..160));
        // Nothing spills into the top and bottom rows
        assert!(!has_ink(&img, 0..40, 0..10));
        assert!(!has_ink(&img, 0..40, 190..200));
    }
}
