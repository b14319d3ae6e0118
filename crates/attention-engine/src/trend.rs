//! Linear Trend and Moving Average

use serde::{Deserialize, Serialize};

use crate::binning::BucketSeries;

/// Minimum moving-average window
pub const MIN_WINDOW: usize = 3;

/// First-degree least-squares fit `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    /// Fit over paired points
    ///
    /// Fewer than two points or a zero x-spread give a horizontal line
    /// through the mean of `y`.
    pub fn fit(x: &[f64], y: &[f64]) -> Self {
        let n = x.len().min(y.len());
        if n == 0 {
            return Self::default();
        }

        let nf = n as f64;
        let mean_x = x[..n].iter().sum::<f64>() / nf;
        let mean_y = y[..n].iter().sum::<f64>() / nf;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (&xi, &yi) in x[..n].iter().zip(&y[..n]) {
            let dx = xi - mean_x;
            sxx += dx * dx;
            sxy += dx * (yi - mean_y);
        }

        if n < 2 || sxx <= f64::EPSILON {
            return Self {
                slope: 0.0,
                intercept: mean_y,
            };
        }

        let slope = sxy / sxx;
        Self {
            slope,
            intercept: mean_y - slope * mean_x,
        }
    }

    pub fn fit_series(series: &BucketSeries) -> Self {
        Self::fit(&series.times(), &series.averages())
    }

    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Default window: about a tenth of the series, at least [`MIN_WINDOW`]
pub fn default_window(len: usize) -> usize {
    (len / 10).max(MIN_WINDOW)
}

/// Trailing moving average over bucket averages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub window: usize,
    /// (time label of the window's last member, window mean)
    pub points: Vec<(f64, f64)>,
}

impl MovingAverage {
    /// Compute over `series`; empty unless the series is longer than the window
    pub fn compute(series: &BucketSeries, window: usize) -> Self {
        let window = window.max(1);
        let buckets = &series.buckets;

        let points = if buckets.len() > window {
            buckets
                .windows(window)
                .map(|w| {
                    let mean = w.iter().map(|b| b.average).sum::<f64>() / window as f64;
                    (w[window - 1].time, mean)
                })
                .collect()
        } else {
            Vec::new()
        };

        Self { window, points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::Bucket;

    fn series(values: &[f64]) -> BucketSeries {
        BucketSeries {
            buckets: values
                .iter()
                .enumerate()
                .map(|(i, &v)| Bucket {
                    time: 0.5 * (i + 1) as f64,
                    average: v,
                })
                .collect(),
        }
    }

    #[test]
    fn test_fit_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let line = TrendLine::fit(&x, &y);
        assert!((line.slope - 2.0).abs() < 1e-12);
        assert!((line.intercept - 1.0).abs() < 1e-12);
        assert!((line.at(10.0) - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_constant_is_horizontal() {
        let line = TrendLine::fit_series(&series(&[0.7; 6]));
        assert_eq!(line.slope, 0.0);
        assert!((line.intercept - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_fit_degenerate_inputs() {
        let single = TrendLine::fit(&[0.5], &[0.25]);
        assert_eq!(single, TrendLine { slope: 0.0, intercept: 0.25 });

        let same_x = TrendLine::fit(&[1.0, 1.0], &[0.0, 1.0]);
        assert_eq!(same_x.slope, 0.0);
        assert_eq!(same_x.intercept, 0.5);

        assert_eq!(TrendLine::fit(&[], &[]), TrendLine::default());
    }

    #[test]
    fn test_default_window() {
        assert_eq!(default_window(0), 3);
        assert_eq!(default_window(29), 3);
        assert_eq!(default_window(45), 4);
        assert_eq!(default_window(200), 20);
    }

    #[test]
    fn test_moving_average_alignment() {
        let ma = MovingAverage::compute(&series(&[0.0, 1.0, 0.0, 1.0, 1.0]), 3);
        assert_eq!(ma.points.len(), 3);
        assert_eq!(ma.points[0].0, 1.5);
        assert!((ma.points[0].1 - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(ma.points[2].0, 2.5);
        assert!((ma.points[2].1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_moving_average_needs_more_points_than_window() {
        assert!(MovingAverage::compute(&series(&[1.0, 1.0, 1.0]), 3).is_empty());
        assert_eq!(MovingAverage::compute(&series(&[1.0; 4]), 3).points.len(), 2);
    }
}
