//! Calibration statistics over historical final-confidence values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::gateway::GatewayError;

/// How many recent values a snapshot considers by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Read-only source of recent final-confidence percentages, newest first.
/// Owned by the persistence layer; this core never writes to it.
#[async_trait]
pub trait ConfidenceHistory: Send + Sync {
    async fn recent_final_confidences(&self, limit: usize) -> Result<Vec<u32>, GatewayError>;
}

/// Counts of final-confidence values per percentage range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    #[serde(rename = "0-49")]
    pub low: u32,
    #[serde(rename = "50-74")]
    pub mid: u32,
    #[serde(rename = "75-100")]
    pub high: u32,
}

impl BucketCounts {
    pub fn total(&self) -> u32 {
        self.low + self.mid + self.high
    }
}

/// Aggregate view over recent final-confidence values. Recomputed on
/// every report request, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub sample_size: usize,
    /// Mean of the considered values, rounded to 2 decimal places;
    /// absent when there is no history.
    pub mean_final_confidence: Option<f64>,
    pub bucket_counts: BucketCounts,
}

/// Pure aggregation over final-confidence percentages, newest first.
/// At most the first `limit` values are considered.
pub fn snapshot(recent_final_confidences: &[u32], limit: usize) -> CalibrationSnapshot {
    let vals = &recent_final_confidences[..recent_final_confidences.len().min(limit)];

    let mut buckets = BucketCounts::default();
    for &v in vals {
        if v < 50 {
            buckets.low += 1;
        } else if v < 75 {
            buckets.mid += 1;
        } else {
            buckets.high += 1;
        }
    }

    let mean_final_confidence = if vals.is_empty() {
        None
    } else {
        let mean = vals.iter().map(|&v| v as f64).sum::<f64>() / vals.len() as f64;
        Some((mean * 100.0).round() / 100.0)
    };

    CalibrationSnapshot {
        sample_size: vals.len(),
        mean_final_confidence,
        bucket_counts: buckets,
    }
}
