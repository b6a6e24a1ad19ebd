//! Advisory integrity checks for aggregates.
//!
//! A failing check never blocks migration; callers log the report.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::RegionalAggregate;

use super::aggregate::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityCheckKind {
    Completeness,
    Consistency,
    Anonymization,
    Freshness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityCheck {
    pub kind: IntegrityCheckKind,
    pub passed: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub checks: Vec<IntegrityCheck>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn check(&self, kind: IntegrityCheckKind) -> Option<&IntegrityCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }

    pub fn failures(&self) -> Vec<IntegrityCheckKind> {
        self.checks.iter().filter(|c| !c.passed).map(|c| c.kind).collect()
    }
}

fn outcome(kind: IntegrityCheckKind, problems: Vec<String>) -> IntegrityCheck {
    IntegrityCheck {
        kind,
        passed: problems.is_empty(),
        detail: if problems.is_empty() {
            None
        } else {
            Some(problems.join("; "))
        },
    }
}

fn completeness(aggregate: &RegionalAggregate) -> IntegrityCheck {
    let m = &aggregate.metrics;
    let mut problems = Vec::new();
    if m.data_points == 0 {
        problems.push("no data points".to_string());
    }
    if m.device_count == 0 {
        problems.push("no devices".to_string());
    }
    if m.device_count > m.data_points {
        problems.push(format!(
            "deviceCount {} exceeds dataPoints {}",
            m.device_count, m.data_points
        ));
    }
    if aggregate.region.country.is_empty() || aggregate.region.city.is_empty() {
        problems.push("region label incomplete".to_string());
    }
    if aggregate.source.is_empty() {
        problems.push("missing source tag".to_string());
    }
    outcome(IntegrityCheckKind::Completeness, problems)
}

fn consistency(aggregate: &RegionalAggregate) -> IntegrityCheck {
    let m = &aggregate.metrics;
    let r = &aggregate.region;
    let mut problems = Vec::new();
    if !(-120.0..=0.0).contains(&m.average_signal_strength) {
        problems.push(format!("averageSignalStrength {}", m.average_signal_strength));
    }
    if !(m.average_latency >= 0.0) {
        problems.push(format!("averageLatency {}", m.average_latency));
    }
    if !(m.average_throughput >= 0.0) {
        problems.push(format!("averageThroughput {}", m.average_throughput));
    }
    if !(0.0..=1.0).contains(&m.average_availability) {
        problems.push(format!("averageAvailability {}", m.average_availability));
    }
    if !(0.0..=1.0).contains(&m.quality_score) {
        problems.push(format!("qualityScore {}", m.quality_score));
    }
    if !(r.radius >= 0.0) {
        problems.push(format!("radius {}", r.radius));
    }
    if !(-90.0..=90.0).contains(&r.latitude) || !(-180.0..=180.0).contains(&r.longitude) {
        problems.push(format!("center ({}, {})", r.latitude, r.longitude));
    }
    outcome(IntegrityCheckKind::Consistency, problems)
}

fn anonymization(aggregate: &RegionalAggregate) -> IntegrityCheck {
    let m = &aggregate.metrics;
    let r = &aggregate.region;
    let two_decimals = |v: f64| v == round_to(v, 2);
    let whole = |v: f64| v.fract() == 0.0;

    let mut problems = Vec::new();
    if !two_decimals(r.latitude) || !two_decimals(r.longitude) {
        problems.push("coordinates exceed two decimals".to_string());
    }
    if !whole(r.radius) {
        problems.push("radius is not whole meters".to_string());
    }
    if !whole(m.average_signal_strength) || !whole(m.average_latency) || !whole(m.average_throughput) {
        problems.push("signal, latency or throughput not rounded".to_string());
    }
    if !two_decimals(m.average_availability) {
        problems.push("availability exceeds two decimals".to_string());
    }
    outcome(IntegrityCheckKind::Anonymization, problems)
}

fn freshness(aggregate: &RegionalAggregate, now: DateTime<Utc>, max_age: Duration) -> IntegrityCheck {
    let mut problems = Vec::new();
    if aggregate.timestamp > now {
        problems.push(format!("timestamp {} is in the future", aggregate.timestamp));
    } else if now - aggregate.timestamp > max_age {
        problems.push(format!(
            "age {}h exceeds {}h",
            (now - aggregate.timestamp).num_hours(),
            max_age.num_hours()
        ));
    }
    outcome(IntegrityCheckKind::Freshness, problems)
}

pub fn check_integrity(
    aggregate: &RegionalAggregate,
    now: DateTime<Utc>,
    max_age: Duration,
) -> IntegrityReport {
    IntegrityReport {
        checks: vec![
            completeness(aggregate),
            consistency(aggregate),
            anonymization(aggregate),
            freshness(aggregate, now, max_age),
        ],
    }
}
