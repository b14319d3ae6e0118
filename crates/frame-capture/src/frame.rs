//! Video frame types and processing

use image::{imageops, GrayImage, RgbImage};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Media timestamp (nanoseconds from stream start)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame filled with a single color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], timestamp_ns: u64, sequence: u32) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, timestamp_ns, sequence)
    }

    /// Whether the pixel buffer matches the declared dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> GrayFrame {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        GrayFrame {
            data: gray,
            width: self.width,
            height: self.height,
        }
    }

    /// View the frame as an `image` buffer (copies the pixels)
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Single-channel frame, the representation detectors consume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    /// Luma values (width * height)
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GrayFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self { data, width, height }
    }

    /// Crop a region; `None` when the region leaves the frame
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<GrayFrame> {
        if w == 0 || h == 0 || x + w > self.width || y + h > self.height {
            return None;
        }

        let mut cropped = Vec::with_capacity((w * h) as usize);
        for row in y..(y + h) {
            let start = (row * self.width + x) as usize;
            cropped.extend_from_slice(self.data.get(start..start + w as usize)?);
        }
        Some(GrayFrame::new(cropped, w, h))
    }

    /// Resize with bilinear filtering
    pub fn resize(&self, new_width: u32, new_height: u32) -> GrayFrame {
        match self.to_image() {
            Some(img) => {
                let filter = imageops::FilterType::Triangle;
                GrayFrame::from_image(imageops::resize(&img, new_width, new_height, filter))
            }
            None => {
                let blank = vec![0; (new_width * new_height) as usize];
                GrayFrame::new(blank, new_width, new_height)
            }
        }
    }

    /// Mean luma over the whole frame
    pub fn mean_luma(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f32).sum::<f32>() / self.data.len() as f32
    }

    pub fn to_image(&self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn from_image(img: GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height)
    }
}
