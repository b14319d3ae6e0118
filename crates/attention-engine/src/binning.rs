//! Time Bucketing of the Detection Sequence

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AnalysisError;

/// Default number of buckets per second of capture
pub const DEFAULT_BUCKETS_PER_UNIT: u32 = 2;

/// How the trailing partial bucket is averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialBucketPolicy {
    /// Divide by the full bucket size (understates a short trailing run)
    ///
    /// When the sample length leaves a remainder, an all-positive capture
    /// ends in a bucket below 1 and its trend slopes downwards. Only
    /// [`PartialBucketPolicy::Exact`] keeps such a capture flat at 1.
    #[default]
    Legacy,
    /// Divide by the number of samples actually accumulated
    Exact,
}

/// Binning parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Buckets per second of capture
    pub buckets_per_unit: u32,
    /// Averaging of the trailing partial bucket
    pub partial_bucket: PartialBucketPolicy,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            buckets_per_unit: DEFAULT_BUCKETS_PER_UNIT,
            partial_bucket: PartialBucketPolicy::Legacy,
        }
    }
}

/// One time bucket: label on the time axis and mean detection rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub time: f64,
    pub average: f64,
}

/// Sizes derived from the sample length and capture duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinningPlan {
    /// Whole seconds of capture, at least 1
    pub total_time: u64,
    /// Frames per bucket, at least 1
    pub bucket_size: usize,
    /// Frames left over after `total_time * buckets_per_unit` equal runs
    pub remainder: usize,
    /// Frames covered by the equal runs
    pub full_region_length: usize,
}

impl BinningPlan {
    pub fn new(
        len: usize,
        elapsed_seconds: f64,
        buckets_per_unit: u32,
    ) -> Result<Self, AnalysisError> {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return Err(AnalysisError::InvalidDuration(elapsed_seconds));
        }
        if buckets_per_unit == 0 {
            return Err(AnalysisError::InvalidConfig("buckets_per_unit must be at least 1".into()));
        }

        let total_time = (elapsed_seconds.floor() as u64).max(1);
        let target_buckets = (total_time as usize).saturating_mul(buckets_per_unit as usize);
        let bucket_size = (len / target_buckets).max(1);
        let remainder = len % target_buckets;

        Ok(Self {
            total_time,
            bucket_size,
            remainder,
            full_region_length: len - remainder,
        })
    }

    /// Number of leading samples the walk visits
    pub fn walk_length(&self, len: usize) -> usize {
        (self.full_region_length + 1).min(len)
    }
}

/// Time-ordered bucket series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketSeries {
    pub buckets: Vec<Bucket>,
}

impl BucketSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.time).collect()
    }

    pub fn averages(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.average).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }
}

/// Reduce a per-frame detection sequence to time buckets
///
/// Buckets close whenever the running index is a non-zero multiple of the
/// bucket size; labels start at `1 / buckets_per_unit` and advance by the
/// same step. A trailing run with a non-zero sum becomes one extra bucket.
pub fn bin_sample(
    sample: &[bool],
    elapsed_seconds: f64,
    config: &BinningConfig,
) -> Result<BucketSeries, AnalysisError> {
    let plan = BinningPlan::new(sample.len(), elapsed_seconds, config.buckets_per_unit)?;
    let step = 1.0 / config.buckets_per_unit as f64;
    let size = plan.bucket_size;
    let walked = plan.walk_length(sample.len());

    debug!(
        "Binning {} samples: total_time={}s bucket_size={} remainder={} walked={}",
        sample.len(),
        plan.total_time,
        size,
        plan.remainder,
        walked
    );

    let mut buckets = Vec::with_capacity(walked / size + 1);
    let mut label = step;
    let mut sum = 0u64;
    let mut count = 0usize;

    for (index, &detected) in sample.iter().take(walked).enumerate() {
        if index != 0 && index % size == 0 {
            buckets.push(Bucket {
                time: label,
                average: sum as f64 / size as f64,
            });
            sum = 0;
            count = 0;
            label += step;
        }
        sum += detected as u64;
        count += 1;
    }

    if sum > 0 {
        let divisor = match config.partial_bucket {
            PartialBucketPolicy::Legacy => size,
            PartialBucketPolicy::Exact => count,
        };
        buckets.push(Bucket {
            time: label,
            average: sum as f64 / divisor as f64,
        });
    }

    Ok(BucketSeries { buckets })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(values: &[u8]) -> Vec<bool> {
        values.iter().map(|&v| v != 0).collect()
    }

    #[test]
    fn test_plan_clamps_short_captures() {
        let plan = BinningPlan::new(10, 0.4, 2).unwrap();
        assert_eq!(plan.total_time, 1);
        assert_eq!(plan.bucket_size, 5);

        // More buckets requested than samples: size clamps to 1
        let plan = BinningPlan::new(3, 5.0, 2).unwrap();
        assert_eq!(plan.bucket_size, 1);
        assert_eq!(plan.remainder, 3);
        assert_eq!(plan.full_region_length, 0);
        assert_eq!(plan.walk_length(3), 1);
    }

    #[test]
    fn test_plan_rejects_bad_input() {
        assert!(matches!(BinningPlan::new(10, -1.0, 2), Err(AnalysisError::InvalidDuration(_))));
        assert!(matches!(
            BinningPlan::new(10, f64::NAN, 2),
            Err(AnalysisError::InvalidDuration(_))
        ));
        assert!(matches!(BinningPlan::new(10, 2.0, 0), Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn test_worked_example() {
        let sample = bits(&[1, 1, 0, 0, 1, 1, 0, 0]);
        let series = bin_sample(&sample, 2.0, &BinningConfig::default()).unwrap();
        assert_eq!(
            series.buckets,
            vec![
                Bucket { time: 0.5, average: 1.0 },
                Bucket { time: 1.0, average: 0.0 },
                Bucket { time: 1.5, average: 1.0 },
            ]
        );
    }

    #[test]
    fn test_trailing_partial_bucket_policies() {
        // 9 samples over 2s: size 2, remainder 1, walk covers index 8
        let sample = vec![true; 9];
        let legacy = bin_sample(&sample, 2.0, &BinningConfig::default()).unwrap();
        assert_eq!(legacy.len(), 5);
        assert_eq!(legacy.buckets[4], Bucket { time: 2.5, average: 0.5 });

        let exact = bin_sample(
            &sample,
            2.0,
            &BinningConfig {
                partial_bucket: PartialBucketPolicy::Exact,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(exact.buckets[4].average, 1.0);
    }

    #[test]
    fn test_fractional_elapsed_is_floored() {
        let sample = vec![true; 12];
        let series = bin_sample(&sample, 3.9, &BinningConfig::default()).unwrap();
        // total_time 3 -> 6 target buckets of 2 frames
        assert_eq!(series.len(), 6);
        assert!(series.iter().all(|b| b.average == 1.0));
    }

    #[test]
    fn test_empty_sample_has_no_buckets() {
        assert!(bin_sample(&[], 4.0, &BinningConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_single_negative_frame_has_no_buckets() {
        assert!(bin_sample(&[false], 1.0, &BinningConfig::default()).unwrap().is_empty());
        let one = bin_sample(&[true], 1.0, &BinningConfig::default()).unwrap();
        assert_eq!(one.buckets, vec![Bucket { time: 0.5, average: 1.0 }]);
    }

    #[test]
    fn test_buckets_per_unit_sets_label_step() {
        let sample = vec![false; 8];
        let config = BinningConfig {
            buckets_per_unit: 4,
            ..Default::default()
        };
        let series = bin_sample(&sample, 2.0, &config).unwrap();
        // Size 1 closes a bucket at indices 1..=7; the zero-sum tail is dropped
        assert_eq!(series.times(), vec![0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75]);
        assert!(series.averages().iter().all(|&v| v == 0.0));
    }
}
