//! Analysis History

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use attention_engine::{AttentionBreakdown, TrendResult};

use crate::StorageError;

/// One completed analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub analyzed_at: DateTime<Utc>,
    pub source: String,
    pub frames: usize,
    pub elapsed_seconds: f64,
    pub stats: TrendResult,
    pub attention: AttentionBreakdown,
    pub plot_file: String,
    pub pie_file: Option<String>,
}

/// Bounded in-memory history of analysis records, newest last
pub struct Repository {
    records: Mutex<VecDeque<AnalysisRecord>>,
    max_records: usize,
    next_id: Mutex<i64>,
}

impl Repository {
    pub fn new(max_records: usize) -> Self {
        let max_records = max_records.max(1);
        info!("Creating analysis history (max {} records)", max_records);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1024))),
            max_records,
            next_id: Mutex::new(1),
        }
    }

    /// Store a record, assigning its id
    pub fn insert(&self, mut record: AnalysisRecord) -> Result<i64, StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        let mut id = self
            .next_id
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        record.id = *id;
        *id += 1;

        // Enforce retention
        while records.len() >= self.max_records {
            records.pop_front();
        }

        let returned_id = record.id;
        records.push_back(record);
        debug!("Stored analysis record {}", returned_id);
        Ok(returned_id)
    }

    pub fn latest(&self) -> Result<AnalysisRecord, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        records.back().cloned().ok_or(StorageError::NotFound)
    }

    /// Most recent records first
    pub fn recent(&self, limit: usize) -> Result<Vec<AnalysisRecord>, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    pub fn count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frames: usize) -> AnalysisRecord {
        AnalysisRecord {
            id: 0,
            analyzed_at: Utc::now(),
            source: "videos/session.mp4".to_string(),
            frames,
            elapsed_seconds: 2.0,
            stats: TrendResult {
                slope: 0.0,
                intercept: 1.0,
                average_y: 1.0,
                x_range: (0.5, 1.0),
                y_range: (1.0, 1.0),
                data_count: 2,
            },
            attention: AttentionBreakdown {
                paying_attention: 0,
                not_paying_attention: 2,
            },
            plot_file: "eye_tracking_plot.png".to_string(),
            pie_file: None,
        }
    }

    #[test]
    fn test_insert_and_latest() {
        let repo = Repository::default();
        assert!(matches!(repo.latest(), Err(StorageError::NotFound)));

        assert_eq!(repo.insert(record(10)).unwrap(), 1);
        assert_eq!(repo.insert(record(20)).unwrap(), 2);

        let latest = repo.latest().unwrap();
        assert_eq!(latest.id, 2);
        assert_eq!(latest.frames, 20);

        let recent = repo.recent(10).unwrap();
        assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_retention_limit() {
        let repo = Repository::new(3);
        for i in 0..10 {
            repo.insert(record(i)).unwrap();
        }
        assert_eq!(repo.count(), 3);
        assert_eq!(repo.recent(1).unwrap()[0].id, 10);
        let ids: Vec<i64> = repo.recent(10).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 9, 8]);
    }

    #[test]
    fn test_record_serializes_stats_shape() {
        let json = serde_json::to_value(record(5)).unwrap();
        assert_eq!(json["stats"]["x_range"], serde_json::json!([0.5, 1.0]));
        assert_eq!(json["attention"]["not_paying_attention"], 2);
    }
}
