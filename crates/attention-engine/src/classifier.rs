//! Attention Classification of Buckets

use serde::{Deserialize, Serialize};

use crate::binning::BucketSeries;

/// Buckets at or below this average count as "paying attention"
pub const ATTENTION_THRESHOLD: f64 = 0.5;

/// Bucket counts per attention class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttentionBreakdown {
    pub paying_attention: usize,
    pub not_paying_attention: usize,
}

impl AttentionBreakdown {
    pub fn classify(series: &BucketSeries) -> Self {
        let paying_attention = series
            .iter()
            .filter(|b| b.average <= ATTENTION_THRESHOLD)
            .count();
        Self {
            paying_attention,
            not_paying_attention: series.len() - paying_attention,
        }
    }

    pub fn total(&self) -> usize {
        self.paying_attention + self.not_paying_attention
    }

    /// Share of buckets classified as paying attention (0 when empty)
    pub fn paying_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.paying_attention as f64 / total as f64,
        }
    }
}
