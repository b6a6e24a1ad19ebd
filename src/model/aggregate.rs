//! Regional aggregates: the only telemetry-derived records that leave the bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreResult;

use super::geo::RegionLabel;

/// Spatial extent of an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters, >= 0.
    pub radius: f64,
    pub country: String,
    pub city: String,
}

impl Region {
    pub fn label(&self) -> RegionLabel {
        RegionLabel::new(&self.country, &self.city)
    }

    pub fn empty(label: &RegionLabel) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            radius: 0.0,
            country: label.country.clone(),
            city: label.city.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub average_signal_strength: f64,
    pub average_latency: f64,
    pub average_throughput: f64,
    pub average_availability: f64,
    /// Distinct contributing devices.
    pub device_count: u64,
    /// Contributing records.
    pub data_points: u64,
    /// Normalized quality in [0, 1].
    pub quality_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalAggregate {
    pub region: Region,
    pub metrics: AggregateMetrics,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub version: u32,
}

impl RegionalAggregate {
    pub fn label(&self) -> RegionLabel {
        self.region.label()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.data_points == 0
    }

    /// SHA-256 over the canonical JSON encoding. Equal aggregates hash equal,
    /// which makes the hash usable as a dedup key for migration retries.
    pub fn content_hash(&self) -> CoreResult<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// An aggregate as recorded on the permissioned layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAggregate {
    pub record_id: String,
    pub content_hash: String,
    pub aggregate: RegionalAggregate,
}
