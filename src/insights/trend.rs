//! Performance trend over time-ordered aggregates.

use crate::model::RegionalAggregate;

/// Chunked quality averages over a window of aggregates.
///
/// Holds only the sorted scores; every call to [`PerformanceTrend::iter`]
/// starts a fresh pass that computes chunk averages on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceTrend {
    scores: Vec<f64>,
    chunk_size: usize,
}

impl PerformanceTrend {
    /// `chunk_size` of zero is treated as one.
    pub fn new(aggregates: &[RegionalAggregate], chunk_size: usize) -> Self {
        let mut ordered: Vec<&RegionalAggregate> = aggregates.iter().collect();
        ordered.sort_by_key(|a| a.timestamp);
        Self {
            scores: ordered.iter().map(|a| a.metrics.quality_score).collect(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.scores
            .chunks(self.chunk_size)
            .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
    }

    pub fn points(&self) -> Vec<f64> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.scores.len().div_ceil(self.chunk_size)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggregateMetrics, Region, RegionLabel};
    use chrono::{Duration, TimeZone, Utc};

    fn agg(hour: i64, quality: f64) -> RegionalAggregate {
        RegionalAggregate {
            region: Region::empty(&RegionLabel::new("JP", "Osaka")),
            metrics: AggregateMetrics {
                quality_score: quality,
                data_points: 1,
                device_count: 1,
                ..AggregateMetrics::default()
            },
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            source: "depin-bridge".to_string(),
            version: 1,
        }
    }

    #[test]
    fn test_chunks_in_timestamp_order() {
        // Given out of order; the trend sorts by timestamp first.
        let aggregates = vec![agg(2, 0.6), agg(0, 0.2), agg(3, 0.8), agg(1, 0.4), agg(4, 1.0)];
        let trend = PerformanceTrend::new(&aggregates, 2);

        let points = trend.points();
        assert_eq!(trend.len(), 3);
        assert_eq!(points.len(), 3);
        assert!((points[0] - 0.3).abs() < 1e-12);
        assert!((points[1] - 0.7).abs() < 1e-12);
        assert!((points[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_restartable() {
        let aggregates: Vec<_> = (0..25).map(|h| agg(h, 0.5)).collect();
        let trend = PerformanceTrend::new(&aggregates, 10);
        let first: Vec<f64> = trend.iter().collect();
        let second: Vec<f64> = trend.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_empty_trend() {
        let trend = PerformanceTrend::new(&[], 10);
        assert!(trend.is_empty());
        assert_eq!(trend.iter().count(), 0);
    }
}
