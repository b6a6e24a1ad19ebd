//! Simple-mean aggregation over raw telemetry, plus anonymization.
//!
//! Every aggregate leaving this module has been anonymized: coordinates and
//! availability carry two decimals, everything else is a whole number.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    haversine_distance_m, AggregateMetrics, Region, RegionLabel, RegionalAggregate, TelemetryRecord,
};
use crate::rewards::record_quality_score;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Optional spatial filter: a circle in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl RegionFilter {
    pub fn contains(&self, record: &TelemetryRecord) -> bool {
        haversine_distance_m(
            self.latitude,
            self.longitude,
            record.location.latitude,
            record.location.longitude,
        ) <= self.radius_m
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Strip precision from an aggregate.
pub fn anonymize(mut aggregate: RegionalAggregate) -> RegionalAggregate {
    let region = &mut aggregate.region;
    region.latitude = round_to(region.latitude, 2);
    region.longitude = round_to(region.longitude, 2);
    region.radius = region.radius.round();

    let m = &mut aggregate.metrics;
    m.average_signal_strength = m.average_signal_strength.round();
    m.average_latency = m.average_latency.round();
    m.average_throughput = m.average_throughput.round();
    m.average_availability = round_to(m.average_availability, 2);

    aggregate
}

/// Canonical record order, so float sums do not depend on arrival order.
fn canonical_order(a: &TelemetryRecord, b: &TelemetryRecord) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.device_id.cmp(&b.device_id))
        .then_with(|| a.signal_strength.cmp(&b.signal_strength))
        .then_with(|| a.latency.cmp(&b.latency))
        .then_with(|| a.throughput.cmp(&b.throughput))
        .then_with(|| a.availability.total_cmp(&b.availability))
        .then_with(|| a.location.latitude.total_cmp(&b.location.latitude))
        .then_with(|| a.location.longitude.total_cmp(&b.location.longitude))
}

/// Arithmetic means over raw records of one region.
#[derive(Debug, Clone)]
pub struct SimpleMeanAggregator {
    source: String,
    schema_version: u32,
}

impl SimpleMeanAggregator {
    pub fn new(source: &str, schema_version: u32) -> Self {
        Self {
            source: source.to_string(),
            schema_version,
        }
    }

    /// Aggregate the records that fall inside `window` (and `filter`, if
    /// given). The aggregate is stamped with `window.end`, so the same record
    /// set always yields the same output. No matching records yields all-zero
    /// metrics.
    pub fn aggregate(
        &self,
        label: &RegionLabel,
        records: &[TelemetryRecord],
        filter: Option<&RegionFilter>,
        window: &TimeWindow,
    ) -> RegionalAggregate {
        let mut selected: Vec<&TelemetryRecord> = records
            .iter()
            .filter(|r| window.contains(r.timestamp))
            .filter(|r| filter.map_or(true, |f| f.contains(r)))
            .collect();
        selected.sort_by(|a, b| canonical_order(a, b));

        let (region, metrics) = if selected.is_empty() {
            (Region::empty(label), AggregateMetrics::default())
        } else {
            (region_of(label, &selected), metrics_of(&selected))
        };

        anonymize(RegionalAggregate {
            region,
            metrics,
            timestamp: window.end,
            source: self.source.clone(),
            version: self.schema_version,
        })
    }
}

fn region_of(label: &RegionLabel, records: &[&TelemetryRecord]) -> Region {
    let n = records.len() as f64;
    let latitude = records.iter().map(|r| r.location.latitude).sum::<f64>() / n;
    let longitude = records.iter().map(|r| r.location.longitude).sum::<f64>() / n;
    let radius = records
        .iter()
        .map(|r| haversine_distance_m(latitude, longitude, r.location.latitude, r.location.longitude))
        .fold(0.0, f64::max);

    Region {
        latitude,
        longitude,
        radius,
        country: label.country.clone(),
        city: label.city.clone(),
    }
}

fn metrics_of(records: &[&TelemetryRecord]) -> AggregateMetrics {
    let n = records.len() as f64;
    let devices: HashSet<&str> = records.iter().map(|r| r.device_id.as_str()).collect();

    AggregateMetrics {
        average_signal_strength: records.iter().map(|r| f64::from(r.signal_strength)).sum::<f64>() / n,
        average_latency: records.iter().map(|r| f64::from(r.latency)).sum::<f64>() / n,
        average_throughput: records.iter().map(|r| r.throughput as f64).sum::<f64>() / n,
        average_availability: records.iter().map(|r| r.availability).sum::<f64>() / n,
        device_count: devices.len() as u64,
        data_points: records.len() as u64,
        quality_score: records.iter().map(|r| record_quality_score(r)).sum::<f64>() / n,
    }
}
