//! Summary Statistics over the Bucket Series

use serde::{Deserialize, Serialize};

use crate::binning::BucketSeries;
use crate::trend::TrendLine;

/// Trend and range statistics, serialized in the reporting JSON shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Trend line slope
    pub slope: f64,
    /// Trend line intercept
    pub intercept: f64,
    /// Mean bucket average
    pub average_y: f64,
    /// (min, max) of bucket time labels
    pub x_range: (f64, f64),
    /// (min, max) of bucket averages
    pub y_range: (f64, f64),
    /// Number of buckets
    pub data_count: usize,
}

impl TrendResult {
    /// Compute statistics; `None` for an empty series
    pub fn compute(series: &BucketSeries, trend: &TrendLine) -> Option<Self> {
        if series.is_empty() {
            return None;
        }

        let n = series.len() as f64;
        let x_range = min_max(series.iter().map(|b| b.time));
        let y_range = min_max(series.iter().map(|b| b.average));
        let average_y = series.iter().map(|b| b.average).sum::<f64>() / n;

        Some(Self {
            slope: trend.slope,
            intercept: trend.intercept,
            average_y,
            x_range,
            y_range,
            data_count: series.len(),
        })
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
