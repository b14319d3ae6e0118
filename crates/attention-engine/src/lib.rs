//! Attention Analysis Engine
//!
//! Converts a per-frame eye detection sequence into time buckets, fits a
//! linear trend, computes a trailing moving average and summary statistics,
//! and classifies buckets by attention.

mod binning;
mod classifier;
mod statistics;
mod trend;

pub use binning::{
    bin_sample, BinningConfig, BinningPlan, Bucket, BucketSeries, PartialBucketPolicy,
    DEFAULT_BUCKETS_PER_UNIT,
};
pub use classifier::{AttentionBreakdown, ATTENTION_THRESHOLD};
pub use statistics::TrendResult;
pub use trend::{default_window, MovingAverage, TrendLine, MIN_WINDOW};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Analysis errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Nothing to bucket: empty sample, or no bucket could be formed
    #[error("No data to analyze ({frames} frames sampled)")]
    NoData { frames: usize },
    #[error("Invalid capture duration: {0}")]
    InvalidDuration(f64),
    #[error("Invalid analysis configuration: {0}")]
    InvalidConfig(String),
}

/// Analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    #[serde(flatten)]
    pub binning: BinningConfig,
    /// Moving-average window; `None` picks [`default_window`]
    pub window_size: Option<usize>,
}

/// Complete analysis of one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub series: BucketSeries,
    pub trend: TrendLine,
    pub moving_average: MovingAverage,
    pub stats: TrendResult,
    pub attention: AttentionBreakdown,
}

/// Bin a detection sequence and compute its trend statistics
pub fn bin_and_analyze(
    sample: &[bool],
    elapsed_seconds: f64,
    buckets_per_unit: u32,
) -> Result<(BucketSeries, TrendResult), AnalysisError> {
    let config = BinningConfig {
        buckets_per_unit,
        ..Default::default()
    };
    let series = bin_sample(sample, elapsed_seconds, &config)?;
    let trend = TrendLine::fit_series(&series);
    let stats = TrendResult::compute(&series, &trend).ok_or(AnalysisError::NoData {
        frames: sample.len(),
    })?;
    Ok((series, stats))
}

/// Run the full analysis with explicit configuration
pub fn analyze(
    sample: &[bool],
    elapsed_seconds: f64,
    config: &AnalysisConfig,
) -> Result<Analysis, AnalysisError> {
    if sample.is_empty() {
        return Err(AnalysisError::NoData { frames: 0 });
    }
    if config.window_size == Some(0) {
        return Err(AnalysisError::InvalidConfig("window_size must be at least 1".into()));
    }

    let series = bin_sample(sample, elapsed_seconds, &config.binning)?;
    let trend = TrendLine::fit_series(&series);
    let stats = TrendResult::compute(&series, &trend).ok_or(AnalysisError::NoData {
        frames: sample.len(),
    })?;

    let window = config
        .window_size
        .unwrap_or_else(|| default_window(series.len()));
    let moving_average = MovingAverage::compute(&series, window);
    let attention = AttentionBreakdown::classify(&series);

    debug!(
        "Moving average window {} produced {} points",
        window,
        moving_average.points.len()
    );
    info!(
        "Analyzed {} frames into {} buckets: y = {:.6}x + {:.6}, mean {:.6}",
        sample.len(),
        stats.data_count,
        stats.slope,
        stats.intercept,
        stats.average_y
    );

    Ok(Analysis {
        series,
        trend,
        moving_average,
        stats,
        attention,
    })
}
