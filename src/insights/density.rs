use std::f64::consts::PI;

use crate::model::RegionalAggregate;

/// Devices per square meter across a set of aggregates:
/// `Σ deviceCount / Σ(π·radius²)`. Zero when there is nothing to measure.
pub fn coverage_density(aggregates: &[RegionalAggregate]) -> f64 {
    let devices: u64 = aggregates.iter().map(|a| a.metrics.device_count).sum();
    let area: f64 = aggregates
        .iter()
        .map(|a| PI * a.region.radius * a.region.radius)
        .sum();

    if aggregates.is_empty() || area <= 0.0 {
        0.0
    } else {
        devices as f64 / area
    }
}
