//! Plot Rendering
//!
//! Draws the bucket series, trend line and moving average to a PNG, and the
//! attention breakdown as a pie chart. Rendering only reads analysis results.

mod canvas;
mod pie;
mod text;

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use attention_engine::{AttentionBreakdown, BucketSeries, MovingAverage, TrendLine};

use canvas::{PlotArea, AVERAGE_GREEN, BLACK, GRID, RAW_BLUE, TREND_RED, WHITE};
use pie::PieGeometry;
pub use pie::{NOT_PAYING_COLOR, PAYING_COLOR};
use text::{Align, Typeface};

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Nothing to plot")]
    EmptySeries,
    #[error("Invalid plot configuration: {0}")]
    InvalidConfig(String),
    #[error("Embedded font unusable: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Plot layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Fixed y-axis limits
    pub y_min: f64,
    pub y_max: f64,
    /// Fraction of the x span added on each side
    pub x_padding: f64,
    /// Grid divisions per axis
    pub grid_divisions: u32,
    /// Pie chart height; the canvas is half again as wide for slice labels
    pub pie_size: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            title: "Eye Tracking Analysis".to_string(),
            width: 1200,
            height: 600,
            y_min: -0.1,
            y_max: 1.1,
            x_padding: 0.05,
            grid_divisions: 10,
            pie_size: 480,
        }
    }
}

impl PlotConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width < 300 || self.height < 200 {
            return Err(RenderError::InvalidConfig(format!(
                "plot must be at least 300x200, got {}x{}",
                self.width, self.height
            )));
        }
        if self.y_min.is_nan() || self.y_max.is_nan() || self.y_max <= self.y_min {
            return Err(RenderError::InvalidConfig(format!(
                "y_max ({}) must exceed y_min ({})",
                self.y_max, self.y_min
            )));
        }
        if self.x_padding < 0.0 || self.pie_size < 120 {
            return Err(RenderError::InvalidConfig(
                "x_padding must be >= 0 and pie_size >= 120".into(),
            ));
        }
        Ok(())
    }
}

const MARGIN_LEFT: u32 = 90;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 50;
const MARGIN_BOTTOM: u32 = 70;

const TITLE_SIZE: f32 = 20.0;
const AXIS_LABEL_SIZE: f32 = 15.0;
const TICK_SIZE: f32 = 12.0;
const LEGEND_SIZE: f32 = 13.0;
const PIE_LABEL_SIZE: f32 = 16.0;

const X_LABEL: &str = "Time (seconds)";
const Y_LABEL: &str = "Eye Detection Score";
const PAYING_LABEL: &str = "Paying Attention";
const NOT_PAYING_LABEL: &str = "Not Paying Attention";

/// PNG plot renderer
#[derive(Debug, Clone)]
pub struct PlotRenderer {
    config: PlotConfig,
    face: Typeface,
}

impl PlotRenderer {
    pub fn new(config: PlotConfig) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self {
            config,
            face: Typeface::load()?,
        })
    }

    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    /// Render the trend plot to `path`
    pub fn render_trend(
        &self,
        series: &BucketSeries,
        trend: &TrendLine,
        moving_average: &MovingAverage,
        path: &Path,
    ) -> Result<PathBuf, RenderError> {
        let points: Vec<(f64, f64)> = series.iter().map(|b| (b.time, b.average)).collect();
        let (first, last) = match (points.first(), points.last()) {
            (Some(f), Some(l)) => (f.0, l.0),
            _ => return Err(RenderError::EmptySeries),
        };

        let cfg = &self.config;
        let padding = (last - first) * cfg.x_padding;
        // A single bucket still gets a visible x span
        let (x_min, x_max) = if last > first {
            (first - padding, last + padding)
        } else {
            (first - 0.5, first + 0.5)
        };

        let area = PlotArea {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: cfg.width - MARGIN_LEFT - MARGIN_RIGHT,
            height: cfg.height - MARGIN_TOP - MARGIN_BOTTOM,
            x_min,
            x_max,
            y_min: cfg.y_min,
            y_max: cfg.y_max,
        };

        let mut img = RgbImage::from_pixel(cfg.width, cfg.height, WHITE);
        area.draw_grid(&mut img, cfg.grid_divisions);
        area.draw_frame(&mut img);
        self.draw_axes_text(&mut img, &area);

        area.draw_polyline(&mut img, &points, RAW_BLUE, 1);
        area.draw_markers(&mut img, &points, RAW_BLUE, 3);
        area.draw_dashed(
            &mut img,
            (first, trend.at(first)),
            (last, trend.at(last)),
            TREND_RED,
            12.0,
            2,
        );

        let mut legend = vec![
            ("Raw data".to_string(), RAW_BLUE),
            (
                format!("Trend line: y={:.4}x + {:.4}", trend.slope, trend.intercept),
                TREND_RED,
            ),
        ];
        if !moving_average.is_empty() {
            area.draw_polyline(&mut img, &moving_average.points, AVERAGE_GREEN, 2);
            legend.push((
                format!("Moving avg (window={})", moving_average.window),
                AVERAGE_GREEN,
            ));
        }
        self.draw_legend(&mut img, &area, &legend);

        debug!(
            "Trend plot: {} points, x in [{:.2}, {:.2}], {} moving-average points",
            points.len(),
            x_min,
            x_max,
            moving_average.points.len()
        );
        save(&img, path)
    }

    /// Render the attention breakdown pie chart to `path`
    pub fn render_attention_pie(
        &self,
        breakdown: &AttentionBreakdown,
        path: &Path,
    ) -> Result<PathBuf, RenderError> {
        if breakdown.total() == 0 {
            return Err(RenderError::EmptySeries);
        }
        let height = self.config.pie_size;
        let width = height * 3 / 2;
        let geometry = PieGeometry {
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            radius: height as f64 * 0.4,
        };

        let mut img = RgbImage::from_pixel(width, height, WHITE);
        pie::draw_pie(&mut img, &geometry, breakdown, 1.5);

        let paying = breakdown.paying_ratio() * 100.0;
        let (paying_mid, not_paying_mid) = pie::mid_angles(breakdown);
        let slices = [
            (PAYING_LABEL, breakdown.paying_attention, paying, paying_mid),
            (
                NOT_PAYING_LABEL,
                breakdown.not_paying_attention,
                100.0 - paying,
                not_paying_mid,
            ),
        ];
        for (label, count, percent, mid) in slices {
            if count == 0 {
                continue;
            }
            let inside = geometry.along(mid, 0.6);
            let percent = format!("{:.1}%", percent);
            self.face.draw(&mut img, &percent, inside, PIE_LABEL_SIZE, BLACK, Align::Center);

            let outside = geometry.along(mid, 1.1);
            let align = if mid.cos() >= 0.0 { Align::Left } else { Align::Right };
            self.face.draw(&mut img, label, outside, PIE_LABEL_SIZE, BLACK, align);
        }

        debug!("Attention pie: {:.1}% paying attention", paying);
        save(&img, path)
    }

    /// Title, axis labels and tick values around the plot area
    fn draw_axes_text(&self, img: &mut RgbImage, area: &PlotArea) {
        let face = &self.face;
        let center_x = (area.left + area.width / 2) as i32;
        let bottom = (area.top + area.height) as i32;

        let title_at = (center_x, MARGIN_TOP as i32 / 2);
        face.draw(img, &self.config.title, title_at, TITLE_SIZE, BLACK, Align::Center);
        face.draw(img, X_LABEL, (center_x, bottom + 48), AXIS_LABEL_SIZE, BLACK, Align::Center);
        face.draw_vertical(
            img,
            Y_LABEL,
            (18, (area.top + area.height / 2) as i32),
            AXIS_LABEL_SIZE,
            BLACK,
        );

        let divisions = self.config.grid_divisions.max(1);
        for i in 0..=divisions {
            let t = i as f64 / divisions as f64;
            let x = area.x_min + (area.x_max - area.x_min) * t;
            let (px, _) = area.to_pixel(x, area.y_min);
            let anchor = (px as i32, bottom + 18);
            face.draw(img, &format!("{:.1}", x), anchor, TICK_SIZE, BLACK, Align::Center);

            let y = area.y_min + (area.y_max - area.y_min) * t;
            let (_, py) = area.to_pixel(area.x_min, y);
            let anchor = (area.left as i32 - 8, py as i32);
            face.draw(img, &format!("{:.1}", y), anchor, TICK_SIZE, BLACK, Align::Right);
        }
    }

    /// Boxed legend in the upper-right corner of the plot area
    fn draw_legend(&self, img: &mut RgbImage, area: &PlotArea, entries: &[(String, Rgb<u8>)]) {
        const ROW: u32 = 22;
        const SWATCH: u32 = 30;

        let text_width = entries
            .iter()
            .map(|(label, _)| self.face.measure(label, LEGEND_SIZE).0)
            .max()
            .unwrap_or(0);
        let width = SWATCH + text_width + 30;
        let height = ROW * entries.len() as u32 + 10;
        let left = (area.left + area.width).saturating_sub(width + 10);
        let top = area.top + 10;

        draw_filled_rect_mut(img, Rect::at(left as i32, top as i32).of_size(width, height), WHITE);
        draw_hollow_rect_mut(img, Rect::at(left as i32, top as i32).of_size(width, height), GRID);

        for (i, (label, color)) in entries.iter().enumerate() {
            let y = (top + 5 + ROW * i as u32 + ROW / 2) as f32;
            let x = (left + 10) as f32;
            for o in -1..=1 {
                let o = o as f32;
                draw_line_segment_mut(img, (x, y + o), (x + SWATCH as f32, y + o), *color);
            }
            let text_at = ((left + 10 + SWATCH + 8) as i32, y as i32);
            self.face.draw(img, label, text_at, LEGEND_SIZE, BLACK, Align::Left);
        }
    }
}

fn save(img: &RgbImage, path: &Path) -> Result<PathBuf, RenderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    img.save(path)?;
    info!("Plot saved to: {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attention_engine::{bin_sample, BinningConfig};

    fn series() -> BucketSeries {
        let sample: Vec<bool> = (0..40).map(|i| i % 3 != 0).collect();
        bin_sample(&sample, 4.0, &BinningConfig::default()).unwrap()
    }

    #[test]
    fn test_render_trend_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eye_tracking_plot.png");
        let series = series();
        let trend = TrendLine::fit_series(&series);
        let ma = MovingAverage::compute(&series, 3);

        let renderer = PlotRenderer::new(PlotConfig::default()).unwrap();
        let written = renderer.render_trend(&series, &trend, &ma, &path).unwrap();
        assert_eq!(written, path);

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (1200, 600));
        assert!(img.pixels().any(|p| *p == RAW_BLUE));
        assert!(img.pixels().any(|p| *p == TREND_RED));
        assert!(img.pixels().any(|p| *p == AVERAGE_GREEN));
    }

    #[test]
    fn test_render_single_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("plot.png");
        let series = bin_sample(&[true], 1.0, &BinningConfig::default()).unwrap();
        let renderer = PlotRenderer::new(PlotConfig::default()).unwrap();
        let trend = TrendLine::fit_series(&series);
        renderer
            .render_trend(&series, &trend, &MovingAverage::default(), &path)
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_empty_series_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PlotRenderer::new(PlotConfig::default()).unwrap();
        let err = renderer
            .render_trend(
                &BucketSeries::default(),
                &TrendLine::default(),
                &MovingAverage::default(),
                &dir.path().join("p.png"),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptySeries));
    }

    #[test]
    fn test_render_pie() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attention_pie.png");
        let renderer = PlotRenderer::new(PlotConfig::default()).unwrap();
        let breakdown = AttentionBreakdown {
            paying_attention: 3,
            not_paying_attention: 7,
        };
        renderer.render_attention_pie(&breakdown, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (720, 480));
        assert!(img.pixels().any(|p| *p == PAYING_COLOR));
        assert!(img.pixels().any(|p| *p == NOT_PAYING_COLOR));

        // Percentages sit inside the slices, names beside them
        let geometry = PieGeometry {
            cx: 360.0,
            cy: 240.0,
            radius: 192.0,
        };
        let (paying_mid, _) = pie::mid_angles(&breakdown);
        let (px, py) = geometry.along(paying_mid, 0.6);
        let (px, py) = (px as u32, py as u32);
        assert!(text::has_ink(&img, px - 25..px + 25, py - 10..py + 10));
        let (lx, ly) = geometry.along(paying_mid, 1.1);
        let (lx, ly) = (lx as u32, ly as u32);
        assert!(text::has_ink(&img, lx..lx + 120, ly - 10..ly + 10));
    }

    #[test]
    fn test_trend_plot_carries_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labelled.png");
        let series = series();
        let renderer = PlotRenderer::new(PlotConfig::default()).unwrap();
        renderer
            .render_trend(
                &series,
                &TrendLine::fit_series(&series),
                &MovingAverage::compute(&series, 3),
                &path,
            )
            .unwrap();
        let img = image::open(&path).unwrap().to_rgb8();

        // Title band above the plot frame
        assert!(text::has_ink(&img, 400..800, 5..MARGIN_TOP - 5));
        // Rotated y-axis label in the left margin
        assert!(text::has_ink(&img, 5..32, 200..400));
        // x-axis label below the tick values
        assert!(text::has_ink(&img, 500..700, 600 - MARGIN_BOTTOM + 36..595));
        // Legend text right of the colour swatches
        assert!(text::has_ink(&img, 900..1160, MARGIN_TOP + 15..MARGIN_TOP + 80));
    }

    #[test]
    fn test_empty_title_leaves_band_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("untitled.png");
        let series = series();
        let config = PlotConfig {
            title: String::new(),
            ..Default::default()
        };
        let trend = TrendLine::fit_series(&series);
        PlotRenderer::new(config)
            .unwrap()
            .render_trend(&series, &trend, &MovingAverage::default(), &path)
            .unwrap();
        let img = image::open(&path).unwrap().to_rgb8();
        assert!(!text::has_ink(&img, 400..800, 5..MARGIN_TOP - 12));
    }

    #[test]
    fn test_config_validation() {
        let bad_limits = PlotConfig {
            y_min: 1.0,
            y_max: 0.0,
            ..Default::default()
        };
        assert!(matches!(PlotRenderer::new(bad_limits), Err(RenderError::InvalidConfig(_))));

        let tiny = PlotConfig {
            width: 10,
            ..Default::default()
        };
        assert!(PlotRenderer::new(tiny).is_err());
    }
}
