//! Weighted roll-up of aggregates that share a region.

use crate::error::{CoreError, CoreResult};
use crate::model::{haversine_distance_m, AggregateMetrics, Region, RegionalAggregate};

use super::aggregate::anonymize;

/// Combine aggregates of one region into a single aggregate, weighting every
/// mean by `data_points`.
///
/// Device counts are summed, so a device seen in several inputs is counted
/// once per input. The result's extent covers every input circle.
pub fn rollup(aggregates: &[RegionalAggregate]) -> CoreResult<RegionalAggregate> {
    let first = aggregates
        .first()
        .ok_or_else(|| CoreError::validation("rollup", "no aggregates to roll up"))?;
    let label = first.label();

    if let Some(other) = aggregates.iter().find(|a| a.label() != label) {
        return Err(CoreError::RegionMismatch {
            expected: label.to_string(),
            found: other.label().to_string(),
        });
    }

    let total_points: u64 = aggregates.iter().map(|a| a.metrics.data_points).sum();
    let timestamp = aggregates
        .iter()
        .map(|a| a.timestamp)
        .max()
        .unwrap_or(first.timestamp);
    let version = aggregates.iter().map(|a| a.version).max().unwrap_or(first.version);

    if total_points == 0 {
        return Ok(RegionalAggregate {
            region: Region::empty(&label),
            metrics: AggregateMetrics::default(),
            timestamp,
            source: first.source.clone(),
            version,
        });
    }

    let weighted = |f: fn(&RegionalAggregate) -> f64| -> f64 {
        aggregates
            .iter()
            .map(|a| f(a) * a.metrics.data_points as f64)
            .sum::<f64>()
            / total_points as f64
    };

    let latitude = weighted(|a| a.region.latitude);
    let longitude = weighted(|a| a.region.longitude);
    let radius = aggregates
        .iter()
        .filter(|a| a.metrics.data_points > 0)
        .map(|a| {
            haversine_distance_m(latitude, longitude, a.region.latitude, a.region.longitude)
                + a.region.radius
        })
        .fold(0.0, f64::max);

    let metrics = AggregateMetrics {
        average_signal_strength: weighted(|a| a.metrics.average_signal_strength),
        average_latency: weighted(|a| a.metrics.average_latency),
        average_throughput: weighted(|a| a.metrics.average_throughput),
        average_availability: weighted(|a| a.metrics.average_availability),
        device_count: aggregates.iter().map(|a| a.metrics.device_count).sum(),
        data_points: total_points,
        quality_score: weighted(|a| a.metrics.quality_score),
    };

    Ok(anonymize(RegionalAggregate {
        region: Region {
            latitude,
            longitude,
            radius,
            country: label.country,
            city: label.city,
        },
        metrics,
        timestamp,
        source: first.source.clone(),
        version,
    }))
}
