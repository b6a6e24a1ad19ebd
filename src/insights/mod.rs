//! Network insights over a window of regional aggregates.

pub mod density;
pub mod recommendations;
pub mod trend;

pub use density::*;
pub use recommendations::*;
pub use trend::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{RegionLabel, RegionalAggregate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInsights {
    pub region: RegionLabel,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub aggregate_count: usize,
    pub total_data_points: u64,
    pub coverage_density: f64,
    pub average_quality: f64,
    pub performance_trend: Vec<f64>,
    pub recommendations: Vec<Recommendation>,
}

/// Summarize the aggregates of one region in `[start, end)`.
pub fn network_insights(
    region: &RegionLabel,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    aggregates: &[RegionalAggregate],
    chunk_size: usize,
) -> NetworkInsights {
    let in_window: Vec<RegionalAggregate> = aggregates
        .iter()
        .filter(|a| &a.label() == region && a.timestamp >= start && a.timestamp < end)
        .cloned()
        .collect();

    NetworkInsights {
        region: region.clone(),
        start,
        end,
        aggregate_count: in_window.len(),
        total_data_points: in_window.iter().map(|a| a.metrics.data_points).sum(),
        coverage_density: coverage_density(&in_window),
        average_quality: average_quality(&in_window).unwrap_or(0.0),
        performance_trend: PerformanceTrend::new(&in_window, chunk_size).points(),
        recommendations: recommendations(&in_window),
    }
}
